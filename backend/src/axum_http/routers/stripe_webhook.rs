use crate::{
    config::config_model::DotEnvyConfig,
    usecases::billing_events::{BillingEventGateway, BillingEventUseCase},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::repositories::subscriptions::SubscriptionRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::subscriptions::SubscriptionPostgres,
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::{error, info};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let stripe_client = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        format!(
            "{}?session_id={{CHECKOUT_SESSION_ID}}&success=true",
            config.stripe.app_url
        ),
        format!("{}?canceled=true", config.stripe.app_url),
        config.stripe.app_url.clone(),
    );

    let usecase =
        BillingEventUseCase::new(Arc::new(subscription_repository), Arc::new(stripe_client));

    Router::new()
        .route("/stripe", post(handle_stripe_event))
        .with_state(Arc::new(usecase))
}

/// Signature verification happens inside the usecase so the handler only
/// shuttles the raw body through. A 2xx acknowledges the event; anything else
/// makes the provider redeliver it later.
pub async fn handle_stripe_event<S, G>(
    State(usecase): State<Arc<BillingEventUseCase<S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    G: BillingEventGateway + Send + Sync + 'static,
{
    info!("billing_events: stripe webhook received");
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match usecase.handle_stripe_webhook(&body, signature).await {
        Ok(()) => Json(serde_json::json!({ "received": true })).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(error = ?err, "billing_events: failed to process stripe webhook");
                return (status, "Failed to process webhook".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}
