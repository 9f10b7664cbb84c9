use crate::usecases::auth::AuthUseCase;
use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use crates::{
    domain::{
        repositories::users::UserRepository,
        value_objects::users::{LoginUserModel, RegisterUserModel},
    },
    infra::db::{postgres::postgres_connection::PgPoolSquad, repositories::users::UserPostgres},
};
use std::sync::Arc;
use tracing::{error, info};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let usecase = AuthUseCase::new(Arc::new(user_repository));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(Arc::new(usecase))
}

pub async fn register<U>(
    State(usecase): State<Arc<AuthUseCase<U>>>,
    Json(payload): Json<RegisterUserModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
{
    info!("auth: register request received");
    match usecase.register(payload).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(error = ?err, "auth: failed to register user");
                return (status, "Failed to register user".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}

pub async fn login<U>(
    State(usecase): State<Arc<AuthUseCase<U>>>,
    Json(payload): Json<LoginUserModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
{
    info!("auth: login request received");
    match usecase.login(payload).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            let status = err.status_code();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(error = ?err, "auth: failed to log in user");
                return (status, "Failed to log in".to_string()).into_response();
            }
            (status, err.to_string()).into_response()
        }
    }
}
