use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use crates::{
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::{
            enums::subscription_statuses::SubscriptionStatus,
            subscriptions::CheckoutSnapshotUpdate,
        },
    },
    payments::stripe_client::{StripeClient, StripeEvent, StripeSubscription},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait BillingEventGateway: Send + Sync {
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;
}

#[async_trait]
impl BillingEventGateway for StripeClient {
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }
}

#[derive(Debug, Error)]
pub enum BillingEventError {
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingEventError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            BillingEventError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            BillingEventError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BillingEventError>;

/// Projects billing provider events into the local subscription snapshot.
///
/// Malformed or incomplete events are logged and acknowledged so the provider
/// does not redeliver them; only true processing failures (storage or provider
/// calls) propagate as errors and withhold the acknowledgement.
pub struct BillingEventUseCase<S, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    G: BillingEventGateway + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    gateway: Arc<G>,
}

impl<S, G> BillingEventUseCase<S, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    G: BillingEventGateway + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>, gateway: Arc<G>) -> Self {
        Self {
            subscription_repo,
            gateway,
        }
    }

    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<()> {
        let event = self
            .gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                let rejected =
                    BillingEventError::InvalidWebhook("signature verification failed".to_string());
                warn!(
                    error = %err,
                    status = rejected.status_code().as_u16(),
                    "billing_events: stripe webhook verification failed"
                );
                rejected
            })?;

        let event_type = event.type_.clone();
        info!(event_type = %event_type, "billing_events: stripe webhook verified");

        match event_type.as_str() {
            "checkout.session.completed" => {
                self.handle_checkout_completed(&event).await?;
            }
            "customer.subscription.updated" => {
                self.handle_subscription_updated(&event).await?;
            }
            "customer.subscription.deleted" => {
                self.handle_subscription_deleted(&event).await?;
            }
            "invoice.payment_succeeded" => {
                self.handle_payment_succeeded(&event).await?;
            }
            "invoice.payment_failed" => {
                self.handle_payment_failed(&event).await?;
            }
            _ => {
                debug!("unhandled stripe event type: {:?}", event.type_);
            }
        }

        Ok(())
    }

    async fn handle_checkout_completed(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let Some(session) = StripeClient::extract_checkout_session(event) else {
            warn!("billing_events: checkout session missing in webhook, dropping event");
            return Ok(());
        };

        let metadata = session.metadata.clone().unwrap_or_default();
        let Some(user_id) = metadata
            .get("user_id")
            .and_then(|value| Uuid::parse_str(value).ok())
        else {
            warn!(
                session_id = ?session.id,
                "billing_events: checkout session has no user_id in metadata, dropping event"
            );
            return Ok(());
        };

        let (Some(subscription_ref), Some(customer_ref)) =
            (session.subscription.clone(), session.customer.clone())
        else {
            warn!(
                %user_id,
                session_id = ?session.id,
                "billing_events: checkout session missing subscription or customer ref, dropping event"
            );
            return Ok(());
        };

        let plan = metadata
            .get("plan")
            .cloned()
            .unwrap_or_else(|| "monthly".to_string());

        info!(
            %user_id,
            subscription_ref = %subscription_ref,
            "billing_events: retrieving subscription from stripe"
        );

        let subscription = self
            .gateway
            .retrieve_subscription(&subscription_ref)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_ref = %subscription_ref,
                    error = ?err,
                    "billing_events: failed to retrieve subscription from stripe"
                );
                BillingEventError::Internal(err)
            })?;

        let status = subscription
            .status
            .clone()
            .unwrap_or_else(|| "active".to_string());
        let current_period_end = subscription.period_end().and_then(Self::ts_to_datetime);

        self.subscription_repo
            .upsert_checkout_snapshot(
                user_id,
                CheckoutSnapshotUpdate {
                    stripe_customer_id: customer_ref,
                    stripe_subscription_id: subscription_ref.clone(),
                    plan,
                    status,
                    current_period_end,
                },
            )
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_ref = %subscription_ref,
                    db_error = ?err,
                    "billing_events: failed to upsert subscription snapshot"
                );
                BillingEventError::Internal(err)
            })?;

        info!(
            %user_id,
            subscription_ref = %subscription_ref,
            "billing_events: processed checkout completed webhook"
        );

        Ok(())
    }

    async fn handle_subscription_updated(&self, event: &StripeEvent) -> UseCaseResult<()> {
        #[derive(Deserialize)]
        struct SubscriptionObject {
            id: Option<String>,
            status: Option<String>,
            current_period_end: Option<i64>,
        }

        let subscription: SubscriptionObject = serde_json::from_value(event.data.object.clone())
            .map_err(|err| {
                let rejected =
                    BillingEventError::InvalidWebhook("invalid subscription payload".to_string());
                warn!(
                    error = %err,
                    status = rejected.status_code().as_u16(),
                    "billing_events: invalid subscription payload in webhook"
                );
                rejected
            })?;

        let (Some(subscription_ref), Some(status)) = (subscription.id, subscription.status) else {
            warn!("billing_events: subscription update missing id or status, dropping event");
            return Ok(());
        };

        let current_period_end = subscription
            .current_period_end
            .and_then(Self::ts_to_datetime);

        info!(
            subscription_ref = %subscription_ref,
            status = %status,
            "billing_events: applying subscription update from webhook"
        );

        self.subscription_repo
            .update_status_and_period_by_provider_subscription_id(
                &subscription_ref,
                &status,
                current_period_end,
            )
            .await
            .map_err(|err| {
                error!(
                    subscription_ref = %subscription_ref,
                    db_error = ?err,
                    "billing_events: failed to apply subscription update"
                );
                BillingEventError::Internal(err)
            })?;

        Ok(())
    }

    async fn handle_subscription_deleted(&self, event: &StripeEvent) -> UseCaseResult<()> {
        #[derive(Deserialize)]
        struct SubscriptionObject {
            id: Option<String>,
        }

        let subscription: SubscriptionObject = serde_json::from_value(event.data.object.clone())
            .map_err(|err| {
                let rejected =
                    BillingEventError::InvalidWebhook("invalid subscription payload".to_string());
                warn!(
                    error = %err,
                    status = rejected.status_code().as_u16(),
                    "billing_events: invalid subscription payload in webhook"
                );
                rejected
            })?;

        let Some(subscription_ref) = subscription.id else {
            warn!("billing_events: subscription delete missing id, dropping event");
            return Ok(());
        };

        info!(
            subscription_ref = %subscription_ref,
            "billing_events: marking subscription canceled from webhook"
        );

        self.subscription_repo
            .update_status_by_provider_subscription_id(
                &subscription_ref,
                SubscriptionStatus::Canceled,
            )
            .await
            .map_err(|err| {
                error!(
                    subscription_ref = %subscription_ref,
                    db_error = ?err,
                    "billing_events: failed to mark subscription canceled"
                );
                BillingEventError::Internal(err)
            })?;

        Ok(())
    }

    async fn handle_payment_succeeded(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let Some(subscription_ref) = Self::invoice_subscription_ref(event)? else {
            debug!("billing_events: invoice without subscription ref, nothing to touch");
            return Ok(());
        };

        info!(
            subscription_ref = %subscription_ref,
            "billing_events: touching subscription after successful payment"
        );

        self.subscription_repo
            .touch_by_provider_subscription_id(&subscription_ref)
            .await
            .map_err(|err| {
                error!(
                    subscription_ref = %subscription_ref,
                    db_error = ?err,
                    "billing_events: failed to touch subscription snapshot"
                );
                BillingEventError::Internal(err)
            })?;

        Ok(())
    }

    async fn handle_payment_failed(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let Some(subscription_ref) = Self::invoice_subscription_ref(event)? else {
            debug!("billing_events: invoice without subscription ref, nothing to mark");
            return Ok(());
        };

        info!(
            subscription_ref = %subscription_ref,
            "billing_events: marking subscription past_due after failed payment"
        );

        self.subscription_repo
            .update_status_by_provider_subscription_id(
                &subscription_ref,
                SubscriptionStatus::PastDue,
            )
            .await
            .map_err(|err| {
                error!(
                    subscription_ref = %subscription_ref,
                    db_error = ?err,
                    "billing_events: failed to mark subscription past_due"
                );
                BillingEventError::Internal(err)
            })?;

        Ok(())
    }

    fn invoice_subscription_ref(event: &StripeEvent) -> UseCaseResult<Option<String>> {
        #[derive(Deserialize)]
        struct InvoiceObject {
            subscription: Option<String>,
        }

        let invoice: InvoiceObject =
            serde_json::from_value(event.data.object.clone()).map_err(|err| {
                let rejected =
                    BillingEventError::InvalidWebhook("invalid invoice payload".to_string());
                warn!(
                    error = %err,
                    status = rejected.status_code().as_u16(),
                    "billing_events: invalid invoice payload in webhook"
                );
                rejected
            })?;

        Ok(invoice.subscription)
    }

    fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(ts, 0).single()
    }
}
