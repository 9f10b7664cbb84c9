use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
use crate::domain::value_objects::subscriptions::CheckoutSnapshotUpdate;

/// Snapshot storage. Writes are driven exclusively by billing webhook events;
/// every other component reads only. Updates keyed on a provider subscription
/// id are silent no-ops when no matching row exists.
#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn upsert_checkout_snapshot(
        &self,
        user_id: Uuid,
        snapshot: CheckoutSnapshotUpdate,
    ) -> Result<()>;

    async fn update_status_and_period_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
        status: &str,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn update_status_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<()>;

    async fn touch_by_provider_subscription_id(&self, provider_subscription_id: &str)
    -> Result<()>;
}
