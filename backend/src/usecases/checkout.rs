use std::{collections::HashMap, sync::Arc};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::{
        repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
        value_objects::{
            enums::billing_plans::BillingPlan,
            subscriptions::{CreateCheckoutResponse, PortalSessionResponse},
        },
    },
    payments::stripe_client::{CheckoutSessionInfo, StripeClient},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait CheckoutGateway: Send + Sync {
    async fn create_customer(&self, email: &str, name: &str, user_id: Uuid) -> AnyResult<String>;

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: Option<String>,
        metadata: HashMap<String, String>,
    ) -> AnyResult<CheckoutSessionInfo>;

    async fn create_portal_session(&self, customer_id: &str) -> AnyResult<String>;
}

#[async_trait]
impl CheckoutGateway for StripeClient {
    async fn create_customer(&self, email: &str, name: &str, user_id: Uuid) -> AnyResult<String> {
        self.create_customer(email, name, user_id).await
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: Option<String>,
        metadata: HashMap<String, String>,
    ) -> AnyResult<CheckoutSessionInfo> {
        self.create_checkout_session(price_id, customer_id, metadata)
            .await
    }

    async fn create_portal_session(&self, customer_id: &str) -> AnyResult<String> {
        self.create_portal_session(customer_id).await
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Invalid plan. Must be \"monthly\" or \"yearly\"")]
    InvalidPlan,
    #[error("Stripe price ID not configured")]
    MissingPrice,
    #[error("User not found")]
    UserNotFound,
    #[error("No active subscription found")]
    SubscriptionNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::InvalidPlan => StatusCode::BAD_REQUEST,
            CheckoutError::MissingPrice => StatusCode::INTERNAL_SERVER_ERROR,
            CheckoutError::UserNotFound => StatusCode::NOT_FOUND,
            CheckoutError::SubscriptionNotFound => StatusCode::NOT_FOUND,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CheckoutError>;

/// Starts hosted checkout and portal sessions with the billing provider.
/// A provider customer is created lazily on first checkout and its reference
/// is reused from the snapshot on every later one.
pub struct CheckoutUseCase<U, S, G>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: CheckoutGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    gateway: Arc<G>,
    price_id_monthly: String,
    price_id_yearly: String,
}

impl<U, S, G> CheckoutUseCase<U, S, G>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: CheckoutGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        gateway: Arc<G>,
        price_id_monthly: String,
        price_id_yearly: String,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            gateway,
            price_id_monthly,
            price_id_yearly,
        }
    }

    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        plan: Option<String>,
    ) -> UseCaseResult<CreateCheckoutResponse> {
        let plan_raw = plan.unwrap_or_else(|| BillingPlan::Monthly.to_string());
        let plan = BillingPlan::from_str(&plan_raw).ok_or_else(|| {
            let err = CheckoutError::InvalidPlan;
            warn!(
                %user_id,
                plan = %plan_raw,
                status = err.status_code().as_u16(),
                "checkout: rejected unknown plan"
            );
            err
        })?;

        let price_id = match plan {
            BillingPlan::Monthly => &self.price_id_monthly,
            BillingPlan::Yearly => &self.price_id_yearly,
        };
        if price_id.is_empty() {
            let err = CheckoutError::MissingPrice;
            error!(
                %user_id,
                plan = %plan,
                "checkout: no price id configured for plan"
            );
            return Err(err);
        }

        let customer_id = match self.existing_customer_ref(user_id).await? {
            Some(customer_id) => customer_id,
            None => self.create_customer(user_id).await?,
        };

        let metadata = HashMap::from([
            ("user_id".to_string(), user_id.to_string()),
            ("plan".to_string(), plan.to_string()),
        ]);

        let session = self
            .gateway
            .create_checkout_session(price_id, Some(customer_id), metadata)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "checkout: failed to create checkout session");
                CheckoutError::Internal(err)
            })?;

        info!(
            %user_id,
            session_id = %session.session_id,
            plan = %plan,
            "checkout: session created"
        );

        Ok(CreateCheckoutResponse {
            message: "Checkout session created successfully".to_string(),
            session_id: session.session_id,
            url: session.url,
        })
    }

    pub async fn create_portal_session(&self, user_id: Uuid) -> UseCaseResult<PortalSessionResponse> {
        let customer_id = self.existing_customer_ref(user_id).await?.ok_or_else(|| {
            let err = CheckoutError::SubscriptionNotFound;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "checkout: portal requested without customer ref"
            );
            err
        })?;

        let url = self
            .gateway
            .create_portal_session(&customer_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "checkout: failed to create portal session");
                CheckoutError::Internal(err)
            })?;

        info!(%user_id, "checkout: portal session created");

        Ok(PortalSessionResponse {
            message: "Portal session created successfully".to_string(),
            url,
        })
    }

    /// Customer ref from the snapshot, with empty strings treated as absent.
    async fn existing_customer_ref(&self, user_id: Uuid) -> UseCaseResult<Option<String>> {
        let snapshot = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "checkout: failed to load snapshot");
                CheckoutError::Internal(err)
            })?;

        Ok(snapshot
            .and_then(|subscription| subscription.stripe_customer_id)
            .filter(|customer_id| !customer_id.is_empty()))
    }

    async fn create_customer(&self, user_id: Uuid) -> UseCaseResult<String> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "checkout: failed to load user");
                CheckoutError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = CheckoutError::UserNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "checkout: user not found"
                );
                err
            })?;

        let customer_id = self
            .gateway
            .create_customer(&user.email, &user.name, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "checkout: failed to create stripe customer");
                CheckoutError::Internal(err)
            })?;

        info!(%user_id, customer_id = %customer_id, "checkout: stripe customer created");

        Ok(customer_id)
    }
}
