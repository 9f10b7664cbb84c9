use crate::{
    auth::AuthUser,
    config::config_model::DotEnvyConfig,
    usecases::{
        access_policy::AccessPolicyUseCase, usage_limit::UsageLimitUseCase,
        user_status::UserStatusUseCase,
    },
};
use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get,
};
use crates::{
    domain::repositories::{
        subscriptions::SubscriptionRepository, transactions::TransactionRepository,
        users::UserRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            subscriptions::SubscriptionPostgres, transactions::TransactionPostgres,
            users::UserPostgres,
        },
    },
};
use std::sync::Arc;
use tracing::{error, info};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let transaction_repository = TransactionPostgres::new(Arc::clone(&db_pool));

    let access_policy = Arc::new(AccessPolicyUseCase::new(
        Arc::clone(&user_repository),
        Arc::new(subscription_repository),
        config.access_policy.free_trial_days,
    ));
    let usage_limit = Arc::new(UsageLimitUseCase::new(
        Arc::clone(&access_policy),
        Arc::new(transaction_repository),
        config.access_policy.free_max_transactions,
    ));
    let usecase = UserStatusUseCase::new(
        user_repository,
        access_policy,
        usage_limit,
        config.access_policy.free_trial_days,
    );

    Router::new()
        .route("/status", get(get_user_status))
        .with_state(Arc::new(usecase))
}

pub async fn get_user_status<U, S, T>(
    State(usecase): State<Arc<UserStatusUseCase<U, S, T>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    info!(%user_id, "user_status: status request received");
    match usecase.status(user_id).await {
        Ok(status) => Json(status).into_response(),
        Err(err) => {
            let status_code = err.status_code();
            if status_code == StatusCode::INTERNAL_SERVER_ERROR {
                error!(%user_id, error = ?err, "user_status: failed to load user status");
                return (status_code, "Failed to load user status".to_string()).into_response();
            }
            (status_code, err.to_string()).into_response()
        }
    }
}
