use crate::{
    auth::AuthUser,
    config::config_model::DotEnvyConfig,
    usecases::{
        access_policy::AccessPolicyUseCase, transactions::TransactionUseCase,
        usage_limit::UsageLimitUseCase,
    },
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, put},
};
use chrono::NaiveDate;
use crates::{
    domain::{
        repositories::{
            subscriptions::SubscriptionRepository, transactions::TransactionRepository,
            users::UserRepository,
        },
        value_objects::{
            enums::{
                sort_order::SortOrder, transaction_kinds::TransactionKind,
                transaction_sort_fields::TransactionSortField,
            },
            transactions::{
                CreateTransactionModel, ListTransactionsFilter, UpdateTransactionModel,
            },
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            subscriptions::SubscriptionPostgres, transactions::TransactionPostgres,
            users::UserPostgres,
        },
    },
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Shared query surface for the list and export endpoints; export ignores the
/// pagination fields.
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    page: Option<i64>,
    limit: Option<i64>,
    #[serde(rename = "type")]
    type_: Option<String>,
    category: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    search: Option<String>,
    sort: Option<String>,
    order: Option<String>,
}

impl TransactionsQuery {
    /// Unknown filter values are dropped rather than rejected, so a bad
    /// `type` or date narrows nothing instead of failing the request.
    fn into_parts(self) -> (i64, i64, ListTransactionsFilter) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let filter = ListTransactionsFilter {
            kind: self.type_.as_deref().and_then(TransactionKind::from_str),
            category: self
                .category
                .map(|category| category.trim().to_string())
                .filter(|category| !category.is_empty()),
            date_from: parse_filter_date(self.date_from.as_deref()),
            date_to: parse_filter_date(self.date_to.as_deref()),
            search: self
                .search
                .map(|search| search.trim().to_string())
                .filter(|search| !search.is_empty()),
            sort_field: self
                .sort
                .as_deref()
                .and_then(TransactionSortField::from_str)
                .unwrap_or_default(),
            sort_order: self
                .order
                .map(|order| order.to_lowercase())
                .as_deref()
                .and_then(SortOrder::from_str)
                .unwrap_or_default(),
            limit: None,
            offset: None,
        };

        (page, limit, filter)
    }
}

fn parse_filter_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
}

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let transaction_repository = Arc::new(TransactionPostgres::new(Arc::clone(&db_pool)));

    let access_policy = Arc::new(AccessPolicyUseCase::new(
        Arc::new(user_repository),
        Arc::new(subscription_repository),
        config.access_policy.free_trial_days,
    ));
    let usage_limit = Arc::new(UsageLimitUseCase::new(
        Arc::clone(&access_policy),
        Arc::clone(&transaction_repository),
        config.access_policy.free_max_transactions,
    ));
    let usecase = TransactionUseCase::new(access_policy, usage_limit, transaction_repository);

    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/export", get(export_transactions))
        .route("/:id", put(update_transaction).delete(delete_transaction))
        .with_state(Arc::new(usecase))
}

pub async fn create_transaction<U, S, T>(
    State(usecase): State<Arc<TransactionUseCase<U, S, T>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(payload): Json<CreateTransactionModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    info!(%user_id, "transactions: create request received");
    match usecase.create(user_id, payload).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(%user_id, error = ?err, "transactions: failed to create transaction");
                return (status, "Failed to create transaction".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}

pub async fn list_transactions<U, S, T>(
    State(usecase): State<Arc<TransactionUseCase<U, S, T>>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<TransactionsQuery>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    info!(%user_id, "transactions: list request received");
    let (page, limit, filter) = query.into_parts();

    match usecase.list(user_id, page, limit, filter).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(%user_id, error = ?err, "transactions: failed to list transactions");
                return (status, "Failed to load transactions".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}

pub async fn update_transaction<U, S, T>(
    State(usecase): State<Arc<TransactionUseCase<U, S, T>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(transaction_id): Path<Uuid>,
    Json(payload): Json<UpdateTransactionModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    info!(%user_id, %transaction_id, "transactions: update request received");
    match usecase.update(user_id, transaction_id, payload).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(
                    %user_id,
                    %transaction_id,
                    error = ?err,
                    "transactions: failed to update transaction"
                );
                return (status, "Failed to update transaction".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}

pub async fn delete_transaction<U, S, T>(
    State(usecase): State<Arc<TransactionUseCase<U, S, T>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(transaction_id): Path<Uuid>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    info!(%user_id, %transaction_id, "transactions: delete request received");
    match usecase.delete(user_id, transaction_id).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(
                    %user_id,
                    %transaction_id,
                    error = ?err,
                    "transactions: failed to delete transaction"
                );
                return (status, "Failed to delete transaction".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}

pub async fn export_transactions<U, S, T>(
    State(usecase): State<Arc<TransactionUseCase<U, S, T>>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<TransactionsQuery>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    info!(%user_id, "transactions: export request received");
    let (_, _, filter) = query.into_parts();

    match usecase.export(user_id, filter).await {
        Ok(export) => {
            let headers = [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.filename),
                ),
            ];
            (StatusCode::OK, headers, export.content).into_response()
        }
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(%user_id, error = ?err, "transactions: failed to export transactions");
                return (status, "Failed to export transactions".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}
