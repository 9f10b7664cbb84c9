use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::subscriptions::SubscriptionEntity;

/// Subscription details surfaced to the client on the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub is_active: bool,
}

impl SubscriptionView {
    pub fn from_entity(entity: &SubscriptionEntity, is_active: bool) -> Self {
        Self {
            plan: entity.plan.clone(),
            status: entity.status.clone(),
            current_period_end: entity.current_period_end,
            stripe_customer_id: entity.stripe_customer_id.clone(),
            is_active,
        }
    }
}

/// Field set written to the snapshot when a checkout completes.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSnapshotUpdate {
    pub stripe_customer_id: String,
    pub stripe_subscription_id: String,
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Checkout request body. Plan defaults to monthly when omitted.
#[derive(Debug, Default, Deserialize)]
pub struct CreateCheckoutRequest {
    pub plan: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    pub message: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PortalSessionResponse {
    pub message: String,
    pub url: String,
}
