use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus, subscriptions::CheckoutSnapshotUpdate,
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_checkout_snapshot(
        &self,
        user_id: Uuid,
        snapshot: CheckoutSnapshotUpdate,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        if let Some(existing_id) = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(subscriptions::id)
            .first::<Uuid>(&mut conn)
            .optional()?
        {
            update(subscriptions::table.filter(subscriptions::id.eq(existing_id)))
                .set((
                    subscriptions::stripe_customer_id.eq(Some(snapshot.stripe_customer_id)),
                    subscriptions::stripe_subscription_id
                        .eq(Some(snapshot.stripe_subscription_id)),
                    subscriptions::plan.eq(snapshot.plan),
                    subscriptions::status.eq(snapshot.status),
                    subscriptions::current_period_end.eq(snapshot.current_period_end),
                    subscriptions::updated_at.eq(Utc::now()),
                ))
                .execute(&mut conn)?;
            return Ok(());
        }

        let insert_entity = InsertSubscriptionEntity {
            user_id,
            stripe_customer_id: Some(snapshot.stripe_customer_id),
            stripe_subscription_id: Some(snapshot.stripe_subscription_id),
            plan: snapshot.plan,
            status: snapshot.status,
            current_period_end: snapshot.current_period_end,
        };

        insert_into(subscriptions::table)
            .values(&insert_entity)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_status_and_period_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
        status: &str,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            subscriptions::table
                .filter(subscriptions::stripe_subscription_id.eq(provider_subscription_id)),
        )
        .set((
            subscriptions::status.eq(status),
            subscriptions::current_period_end.eq(current_period_end),
            subscriptions::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(())
    }

    async fn update_status_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            subscriptions::table
                .filter(subscriptions::stripe_subscription_id.eq(provider_subscription_id)),
        )
        .set((
            subscriptions::status.eq(status.to_string()),
            subscriptions::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(())
    }

    async fn touch_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            subscriptions::table
                .filter(subscriptions::stripe_subscription_id.eq(provider_subscription_id)),
        )
        .set(subscriptions::updated_at.eq(Utc::now()))
        .execute(&mut conn)?;

        Ok(())
    }
}
