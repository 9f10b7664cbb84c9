use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, RunQueryDsl, delete, dsl::sum, insert_into, pg::Pg, prelude::*, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::transactions},
};
use domain::{
    entities::transactions::{
        InsertTransactionEntity, TransactionEntity, UpdateTransactionEntity,
    },
    repositories::transactions::TransactionRepository,
    value_objects::{
        enums::{
            sort_order::SortOrder, transaction_kinds::TransactionKind,
            transaction_sort_fields::TransactionSortField,
        },
        transactions::{ListTransactionsFilter, TransactionSummary},
    },
};

pub struct TransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    /// Applies the shared filter set; sorting and pagination stay with `list`.
    fn apply_filters<'a, ST>(
        mut query: transactions::BoxedQuery<'a, Pg, ST>,
        filter: &ListTransactionsFilter,
    ) -> transactions::BoxedQuery<'a, Pg, ST> {
        if let Some(kind) = filter.kind {
            query = query.filter(transactions::type_.eq(kind.to_string()));
        }

        if let Some(category) = &filter.category {
            query = query.filter(transactions::category.eq(category.clone()));
        }

        if let Some(date_from) = filter.date_from {
            query = query.filter(transactions::date.ge(date_from));
        }

        if let Some(date_to) = filter.date_to {
            query = query.filter(transactions::date.le(date_to));
        }

        if let Some(search) = &filter.search {
            query = query.filter(transactions::description.like(format!("%{}%", search)));
        }

        query
    }
}

#[async_trait]
impl TransactionRepository for TransactionPostgres {
    async fn count_by_user_id(&self, user_id: Uuid) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(result)
    }

    async fn insert(
        &self,
        insert_transaction_entity: InsertTransactionEntity,
    ) -> Result<TransactionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(transactions::table)
            .values(&insert_transaction_entity)
            .returning(TransactionEntity::as_returning())
            .get_result::<TransactionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id_and_user_id(
        &self,
        transaction_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = transactions::table
            .filter(transactions::id.eq(transaction_id))
            .filter(transactions::user_id.eq(user_id))
            .select(TransactionEntity::as_select())
            .first::<TransactionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn update(
        &self,
        transaction_id: Uuid,
        user_id: Uuid,
        mut update_transaction_entity: UpdateTransactionEntity,
    ) -> Result<Option<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update_transaction_entity.updated_at = Some(Utc::now());

        let result = update(
            transactions::table
                .filter(transactions::id.eq(transaction_id))
                .filter(transactions::user_id.eq(user_id)),
        )
        .set(&update_transaction_entity)
        .returning(TransactionEntity::as_returning())
        .get_result::<TransactionEntity>(&mut conn)
        .optional()?;

        Ok(result)
    }

    async fn delete_by_id_and_user_id(&self, transaction_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = delete(
            transactions::table
                .filter(transactions::id.eq(transaction_id))
                .filter(transactions::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;

        Ok(affected > 0)
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &ListTransactionsFilter,
    ) -> Result<Vec<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = Self::apply_filters(
            transactions::table
                .filter(transactions::user_id.eq(user_id))
                .select(TransactionEntity::as_select())
                .into_boxed(),
            filter,
        );

        query = match (filter.sort_field, filter.sort_order) {
            (TransactionSortField::Date, SortOrder::Asc) => query.order(transactions::date.asc()),
            (TransactionSortField::Date, SortOrder::Desc) => {
                query.order(transactions::date.desc())
            }
            (TransactionSortField::Amount, SortOrder::Asc) => {
                query.order(transactions::amount_minor.asc())
            }
            (TransactionSortField::Amount, SortOrder::Desc) => {
                query.order(transactions::amount_minor.desc())
            }
            (TransactionSortField::CreatedAt, SortOrder::Asc) => {
                query.order(transactions::created_at.asc())
            }
            (TransactionSortField::CreatedAt, SortOrder::Desc) => {
                query.order(transactions::created_at.desc())
            }
        };

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }

        let results = query.load::<TransactionEntity>(&mut conn)?;

        Ok(results)
    }

    async fn count_filtered(&self, user_id: Uuid, filter: &ListTransactionsFilter) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let query = Self::apply_filters(
            transactions::table
                .filter(transactions::user_id.eq(user_id))
                .count()
                .into_boxed(),
            filter,
        );

        let result = query.get_result::<i64>(&mut conn)?;

        Ok(result)
    }

    async fn summarize(
        &self,
        user_id: Uuid,
        filter: &ListTransactionsFilter,
    ) -> Result<TransactionSummary> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let income_query = Self::apply_filters(
            transactions::table
                .filter(transactions::user_id.eq(user_id))
                .filter(transactions::type_.eq(TransactionKind::Income.to_string()))
                .select(sum(transactions::amount_minor))
                .into_boxed(),
            filter,
        );
        let total_income_minor = income_query.first::<Option<i64>>(&mut conn)?.unwrap_or(0);

        let expense_query = Self::apply_filters(
            transactions::table
                .filter(transactions::user_id.eq(user_id))
                .filter(transactions::type_.eq(TransactionKind::Expense.to_string()))
                .select(sum(transactions::amount_minor))
                .into_boxed(),
            filter,
        );
        let total_expenses_minor = expense_query.first::<Option<i64>>(&mut conn)?.unwrap_or(0);

        Ok(TransactionSummary {
            total_income_minor,
            total_expenses_minor,
        })
    }
}
