use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::transactions::{
    InsertTransactionEntity, TransactionEntity, UpdateTransactionEntity,
};
use crate::domain::value_objects::transactions::{ListTransactionsFilter, TransactionSummary};

#[async_trait]
#[automock]
pub trait TransactionRepository {
    /// Unfiltered per-user row count; feeds the free-tier usage ceiling.
    async fn count_by_user_id(&self, user_id: Uuid) -> Result<i64>;

    async fn insert(
        &self,
        insert_transaction_entity: InsertTransactionEntity,
    ) -> Result<TransactionEntity>;

    async fn find_by_id_and_user_id(
        &self,
        transaction_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TransactionEntity>>;

    /// Returns `None` when the row does not exist or belongs to another user.
    async fn update(
        &self,
        transaction_id: Uuid,
        user_id: Uuid,
        update_transaction_entity: UpdateTransactionEntity,
    ) -> Result<Option<TransactionEntity>>;

    /// Returns whether a row was actually deleted.
    async fn delete_by_id_and_user_id(&self, transaction_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn list(
        &self,
        user_id: Uuid,
        filter: &ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>>;

    async fn count_filtered(&self, user_id: Uuid, filter: &ListTransactionsFilter) -> Result<i64>;

    async fn summarize(
        &self,
        user_id: Uuid,
        filter: &ListTransactionsFilter,
    ) -> Result<TransactionSummary>;
}
