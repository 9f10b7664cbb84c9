use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::transactions::TransactionEntity;
use crate::domain::value_objects::access::AccessDecision;
use crate::domain::value_objects::enums::{
    sort_order::SortOrder, transaction_kinds::TransactionKind,
    transaction_sort_fields::TransactionSortField,
};

/// Wire representation of a transaction. Amounts leave the API as two-decimal
/// floats even though storage is integer minor units.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionModel {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub type_: String,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransactionEntity> for TransactionModel {
    fn from(entity: TransactionEntity) -> Self {
        Self {
            id: entity.id,
            type_: entity.type_,
            category: entity.category,
            amount: entity.amount_minor as f64 / 100.0,
            description: entity.description,
            date: entity.date,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Create payload. Required fields stay `Option` so the usecase can report
/// which one is missing instead of failing at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTransactionModel {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

/// Partial update; absent fields are left untouched. `description` uses a
/// double `Option` so an explicit JSON null clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTransactionModel {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub date: Option<String>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Query constraints for listing, counting and summarizing a user's
/// transactions. `limit`/`offset` are `None` for unpaginated reads (export).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListTransactionsFilter {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub sort_field: TransactionSortField,
    pub sort_order: SortOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Income/expense totals in minor units over a filtered set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub total_income_minor: i64,
    pub total_expenses_minor: i64,
}

#[derive(Debug, Serialize)]
pub struct PaginationModel {
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryModel {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_balance: f64,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AccessStatusModel {
    pub has_access: bool,
    pub is_in_free_trial: bool,
    pub has_active_subscription: bool,
}

impl From<&AccessDecision> for AccessStatusModel {
    fn from(decision: &AccessDecision) -> Self {
        Self {
            has_access: decision.has_access,
            is_in_free_trial: decision.is_in_free_trial,
            has_active_subscription: decision.has_active_subscription,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionModel>,
    pub pagination: PaginationModel,
    pub summary: SummaryModel,
    pub subscription_status: AccessStatusModel,
}

#[derive(Debug, Serialize)]
pub struct TransactionMutationResponse {
    pub message: String,
    pub transaction: TransactionModel,
}

/// Echo of the row a delete removed, minus the server-side timestamps.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeletedTransactionModel {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub type_: String,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl From<TransactionEntity> for DeletedTransactionModel {
    fn from(entity: TransactionEntity) -> Self {
        Self {
            id: entity.id,
            type_: entity.type_,
            category: entity.category,
            amount: entity.amount_minor as f64 / 100.0,
            description: entity.description,
            date: entity.date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionDeleteResponse {
    pub message: String,
    pub deleted_transaction: DeletedTransactionModel,
}

/// A rendered CSV export plus the filename the client should save it under.
#[derive(Debug, Clone)]
pub struct TransactionExport {
    pub filename: String,
    pub content: String,
}
