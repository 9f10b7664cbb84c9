use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::transactions;

/// Amounts are stored in minor currency units (cents).
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = transactions)]
pub struct TransactionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub type_: String,
    pub category: String,
    pub amount_minor: i32,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = transactions)]
pub struct InsertTransactionEntity {
    pub user_id: Uuid,
    pub type_: String,
    pub category: String,
    pub amount_minor: i32,
    pub description: Option<String>,
    pub date: NaiveDate,
}

/// Changeset for partial updates. `description` is doubly optional so a
/// provided null clears the column while an absent field leaves it alone.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = transactions)]
pub struct UpdateTransactionEntity {
    pub type_: Option<String>,
    pub category: Option<String>,
    pub amount_minor: Option<i32>,
    pub description: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    pub updated_at: Option<DateTime<Utc>>,
}
