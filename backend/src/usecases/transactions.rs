use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use crates::domain::{
    entities::transactions::{
        InsertTransactionEntity, TransactionEntity, UpdateTransactionEntity,
    },
    repositories::{
        subscriptions::SubscriptionRepository, transactions::TransactionRepository,
        users::UserRepository,
    },
    value_objects::{
        enums::transaction_kinds::TransactionKind,
        transactions::{
            AccessStatusModel, CreateTransactionModel, ListTransactionsFilter, PaginationModel,
            SummaryModel, TransactionDeleteResponse, TransactionExport, TransactionListResponse,
            TransactionMutationResponse, UpdateTransactionModel,
        },
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    access_policy::{AccessPolicyError, AccessPolicyUseCase},
    usage_limit::{UsageLimitError, UsageLimitUseCase},
};

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("{0}")]
    Validation(String),
    #[error("Transaction not found or does not belong to you")]
    NotFound,
    #[error(transparent)]
    Limit(#[from] UsageLimitError),
    #[error(transparent)]
    Access(#[from] AccessPolicyError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TransactionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            TransactionError::Validation(_) => StatusCode::BAD_REQUEST,
            TransactionError::NotFound => StatusCode::NOT_FOUND,
            TransactionError::Limit(err) => err.status_code(),
            TransactionError::Access(err) => err.status_code(),
            TransactionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, TransactionError>;

/// CRUD over a user's transactions. Creation runs through the usage ceiling;
/// every other operation requires access (active subscription or trial), so
/// an expired trial can still add rows under the cap but not read them back.
pub struct TransactionUseCase<U, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    access_policy: Arc<AccessPolicyUseCase<U, S>>,
    usage_limit: Arc<UsageLimitUseCase<U, S, T>>,
    transaction_repo: Arc<T>,
}

impl<U, S, T> TransactionUseCase<U, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    pub fn new(
        access_policy: Arc<AccessPolicyUseCase<U, S>>,
        usage_limit: Arc<UsageLimitUseCase<U, S, T>>,
        transaction_repo: Arc<T>,
    ) -> Self {
        Self {
            access_policy,
            usage_limit,
            transaction_repo,
        }
    }

    /// The ceiling check runs before payload validation, so a capped user is
    /// told to upgrade even when the payload is also invalid.
    pub async fn create(
        &self,
        user_id: Uuid,
        payload: CreateTransactionModel,
    ) -> UseCaseResult<TransactionMutationResponse> {
        self.usage_limit.require_limit(user_id).await?;

        let kind_raw = required_field(payload.type_.as_deref(), "type")?;
        let amount = payload
            .amount
            .ok_or_else(|| validation_error("Missing required field: amount"))?;
        let date_raw = required_field(payload.date.as_deref(), "date")?;
        let category = required_field(payload.category.as_deref(), "category")?;

        let kind = parse_kind(&kind_raw)?;
        let amount_minor = parse_amount(amount)?;
        let date = parse_date(&date_raw)?;

        if category.len() > 50 {
            return Err(validation_error(
                "Category must be between 1 and 50 characters",
            ));
        }

        let description = payload
            .description
            .map(|value| value.trim().to_string());
        if let Some(ref value) = description {
            if value.len() > 500 {
                return Err(validation_error(
                    "Description must be less than 500 characters",
                ));
            }
        }

        let transaction = self
            .transaction_repo
            .insert(InsertTransactionEntity {
                user_id,
                type_: kind.as_str().to_string(),
                category,
                amount_minor,
                description,
                date,
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "transactions: failed to insert");
                TransactionError::Internal(err)
            })?;

        info!(%user_id, transaction_id = %transaction.id, "transactions: created");

        Ok(TransactionMutationResponse {
            message: "Transaction created successfully".to_string(),
            transaction: transaction.into(),
        })
    }

    /// Paginated list. The summary and the total count run over the filtered
    /// set, not the returned page, and the caller's subscription status rides
    /// along so the client can render upgrade prompts without a second call.
    pub async fn list(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
        filter: ListTransactionsFilter,
    ) -> UseCaseResult<TransactionListResponse> {
        let decision = self.access_policy.require_access(user_id, true).await?;

        let mut page_filter = filter.clone();
        page_filter.limit = Some(limit);
        page_filter.offset = Some((page - 1) * limit);

        let transactions = self
            .transaction_repo
            .list(user_id, &page_filter)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "transactions: failed to list");
                TransactionError::Internal(err)
            })?;

        let total_items = self
            .transaction_repo
            .count_filtered(user_id, &filter)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "transactions: failed to count");
                TransactionError::Internal(err)
            })?;

        let summary = self
            .transaction_repo
            .summarize(user_id, &filter)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "transactions: failed to summarize");
                TransactionError::Internal(err)
            })?;

        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + limit - 1) / limit
        };

        let total_income = summary.total_income_minor as f64 / 100.0;
        let total_expenses = summary.total_expenses_minor as f64 / 100.0;

        Ok(TransactionListResponse {
            transactions: transactions.into_iter().map(Into::into).collect(),
            pagination: PaginationModel {
                page,
                limit,
                total_items,
                total_pages,
                has_next: page < total_pages,
                has_previous: page > 1,
            },
            summary: SummaryModel {
                total_income,
                total_expenses,
                net_balance: total_income - total_expenses,
                count: total_items,
            },
            subscription_status: AccessStatusModel::from(&decision),
        })
    }

    /// Existence is checked before field validation, so a wrong id reports
    /// 404 even when the payload is also invalid.
    pub async fn update(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        payload: UpdateTransactionModel,
    ) -> UseCaseResult<TransactionMutationResponse> {
        self.access_policy.require_access(user_id, true).await?;

        self.find_owned(user_id, transaction_id).await?;

        let mut changes = UpdateTransactionEntity::default();
        let mut has_changes = false;

        if let Some(kind_raw) = payload.type_ {
            let kind = parse_kind(&kind_raw)?;
            changes.type_ = Some(kind.as_str().to_string());
            has_changes = true;
        }
        if let Some(category) = payload.category {
            let category = category.trim().to_string();
            if category.is_empty() || category.len() > 50 {
                return Err(validation_error(
                    "Category must be between 1 and 50 characters",
                ));
            }
            changes.category = Some(category);
            has_changes = true;
        }
        if let Some(amount) = payload.amount {
            changes.amount_minor = Some(parse_amount(amount)?);
            has_changes = true;
        }
        if let Some(description) = payload.description {
            let description = description.map(|value| value.trim().to_string());
            if let Some(ref value) = description {
                if value.len() > 500 {
                    return Err(validation_error(
                        "Description must be less than 500 characters",
                    ));
                }
            }
            changes.description = Some(description);
            has_changes = true;
        }
        if let Some(date_raw) = payload.date {
            changes.date = Some(parse_date(&date_raw)?);
            has_changes = true;
        }

        if !has_changes {
            return Err(validation_error(
                "No fields to update. Provide at least one field (type, category, amount, description, date).",
            ));
        }

        changes.updated_at = Some(Utc::now());

        let transaction = self
            .transaction_repo
            .update(transaction_id, user_id, changes)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %transaction_id,
                    db_error = ?err,
                    "transactions: failed to update"
                );
                TransactionError::Internal(err)
            })?
            .ok_or(TransactionError::NotFound)?;

        info!(%user_id, %transaction_id, "transactions: updated");

        Ok(TransactionMutationResponse {
            message: "Transaction updated successfully".to_string(),
            transaction: transaction.into(),
        })
    }

    pub async fn delete(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> UseCaseResult<TransactionDeleteResponse> {
        self.access_policy.require_access(user_id, true).await?;

        let existing = self.find_owned(user_id, transaction_id).await?;

        let deleted = self
            .transaction_repo
            .delete_by_id_and_user_id(transaction_id, user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %transaction_id,
                    db_error = ?err,
                    "transactions: failed to delete"
                );
                TransactionError::Internal(err)
            })?;
        if !deleted {
            return Err(TransactionError::Internal(anyhow::anyhow!(
                "delete removed no rows for transaction {}",
                transaction_id
            )));
        }

        info!(%user_id, %transaction_id, "transactions: deleted");

        Ok(TransactionDeleteResponse {
            message: "Transaction deleted successfully".to_string(),
            deleted_transaction: existing.into(),
        })
    }

    /// Unpaginated CSV dump of the filtered set, UTF-8 BOM first so
    /// spreadsheet apps pick the right encoding.
    pub async fn export(
        &self,
        user_id: Uuid,
        filter: ListTransactionsFilter,
    ) -> UseCaseResult<TransactionExport> {
        self.access_policy.require_access(user_id, true).await?;

        let transactions = self
            .transaction_repo
            .list(user_id, &filter)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "transactions: failed to load export rows");
                TransactionError::Internal(err)
            })?;

        let filename = format!(
            "transactions_export_{}.csv",
            Utc::now().format("%Y-%m-%d_%H%M%S")
        );
        let content = render_csv(&transactions);

        info!(
            %user_id,
            count = transactions.len(),
            "transactions: exported csv"
        );

        Ok(TransactionExport { filename, content })
    }

    async fn find_owned(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> UseCaseResult<TransactionEntity> {
        self.transaction_repo
            .find_by_id_and_user_id(transaction_id, user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %transaction_id,
                    db_error = ?err,
                    "transactions: failed to load transaction"
                );
                TransactionError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = TransactionError::NotFound;
                warn!(
                    %user_id,
                    %transaction_id,
                    status = err.status_code().as_u16(),
                    "transactions: transaction not found"
                );
                err
            })
    }
}

fn required_field(value: Option<&str>, field: &str) -> UseCaseResult<String> {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_string()),
        _ => Err(validation_error(&format!(
            "Missing required field: {}",
            field
        ))),
    }
}

fn parse_kind(value: &str) -> UseCaseResult<TransactionKind> {
    TransactionKind::from_str(value)
        .ok_or_else(|| validation_error("Invalid type. Must be \"income\" or \"expense\"."))
}

/// Amounts arrive as two-decimal floats and are stored in minor units.
fn parse_amount(amount: f64) -> UseCaseResult<i32> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(validation_error("Amount must be a positive number"));
    }
    let minor = (amount * 100.0).round();
    if minor > i32::MAX as f64 {
        return Err(validation_error("Amount is too large"));
    }
    Ok(minor as i32)
}

fn parse_date(value: &str) -> UseCaseResult<NaiveDate> {
    if !is_date_shaped(value) {
        return Err(validation_error("Invalid date format. Use YYYY-MM-DD."));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| validation_error("Invalid date. Please provide a valid date."))
}

fn is_date_shaped(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, byte)| match i {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

fn validation_error(message: &str) -> TransactionError {
    let err = TransactionError::Validation(message.to_string());
    warn!(
        status = err.status_code().as_u16(),
        message, "transactions: validation failed"
    );
    err
}

fn render_csv(transactions: &[TransactionEntity]) -> String {
    let mut out = String::from("\u{feff}");
    out.push_str("ID,Type,Category,Amount,Description,Date,Created At\n");
    for transaction in transactions {
        let fields = [
            transaction.id.to_string(),
            capitalize(&transaction.type_),
            transaction.category.clone(),
            format!("{:.2}", transaction.amount_minor as f64 / 100.0),
            transaction.description.clone().unwrap_or_default(),
            transaction.date.to_string(),
            transaction.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        let row = fields
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
