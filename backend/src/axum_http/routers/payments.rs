use crate::{
    auth::AuthUser,
    config::config_model::DotEnvyConfig,
    usecases::checkout::{CheckoutGateway, CheckoutUseCase},
};
use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use crates::{
    domain::{
        repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
        value_objects::subscriptions::CreateCheckoutRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{subscriptions::SubscriptionPostgres, users::UserPostgres},
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::{error, info};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
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

    let usecase = CheckoutUseCase::new(
        Arc::new(user_repository),
        Arc::new(subscription_repository),
        Arc::new(stripe_client),
        config.stripe.price_id_monthly.clone(),
        config.stripe.price_id_yearly.clone(),
    );

    Router::new()
        .route("/create-checkout", post(create_checkout))
        .route("/portal", post(create_portal))
        .with_state(Arc::new(usecase))
}

pub async fn create_checkout<U, S, G>(
    State(usecase): State<Arc<CheckoutUseCase<U, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    payload: Option<Json<CreateCheckoutRequest>>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: CheckoutGateway + Send + Sync + 'static,
{
    info!(%user_id, "checkout: create-checkout request received");
    // An empty body is fine; the plan falls back to monthly.
    let plan = payload.and_then(|Json(request)| request.plan);

    match usecase.create_checkout_session(user_id, plan).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(%user_id, error = ?err, "checkout: failed to create checkout session");
                return (status, "Failed to create checkout session".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}

pub async fn create_portal<U, S, G>(
    State(usecase): State<Arc<CheckoutUseCase<U, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: CheckoutGateway + Send + Sync + 'static,
{
    info!(%user_id, "checkout: portal request received");
    match usecase.create_portal_session(user_id).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(%user_id, error = ?err, "checkout: failed to create portal session");
                return (status, "Failed to create portal session".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}
