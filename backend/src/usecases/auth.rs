use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use crates::domain::{
    entities::users::InsertUserEntity,
    repositories::users::UserRepository,
    value_objects::users::{AuthResponseModel, LoginUserModel, RegisterUserModel},
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::issue_jwt;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AuthError>;

pub struct AuthUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
}

impl<U> AuthUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    pub async fn register(&self, payload: RegisterUserModel) -> UseCaseResult<AuthResponseModel> {
        let email = payload.email.trim().to_string();
        let name = payload.name.trim().to_string();
        let password = payload.password;

        if !is_valid_email(&email) {
            return Err(validation_error("Invalid email format"));
        }
        if email.len() > 255 {
            return Err(validation_error("Email is too long (max 255 characters)"));
        }
        if name.is_empty() {
            return Err(validation_error("Name cannot be empty"));
        }
        if name.len() > 255 {
            return Err(validation_error("Name is too long (max 255 characters)"));
        }
        if password.len() < 8 {
            return Err(validation_error(
                "Password must be at least 8 characters long",
            ));
        }
        if password.len() > 255 {
            return Err(validation_error("Password is too long (max 255 characters)"));
        }

        let existing = self.user_repo.find_by_email(&email).await.map_err(|err| {
            error!(email = %email, db_error = ?err, "auth: failed to check email uniqueness");
            AuthError::Internal(err)
        })?;
        if existing.is_some() {
            let err = AuthError::EmailTaken;
            warn!(
                email = %email,
                status = err.status_code().as_u16(),
                "auth: registration rejected, email already registered"
            );
            return Err(err);
        }

        let password_hash = hash_password(&password).map_err(|err| {
            error!(email = %email, error = ?err, "auth: password hashing failed");
            AuthError::Internal(err)
        })?;

        let user = self
            .user_repo
            .insert(InsertUserEntity {
                email,
                name,
                password_hash,
            })
            .await
            .map_err(|err| {
                error!(db_error = ?err, "auth: failed to insert user");
                AuthError::Internal(err)
            })?;

        let token = issue_jwt(user.id, &user.email).map_err(|err| {
            error!(user_id = %user.id, error = ?err, "auth: failed to issue token");
            AuthError::Internal(err)
        })?;

        info!(user_id = %user.id, "auth: user registered");

        Ok(AuthResponseModel {
            user: user.into(),
            token,
            message: "Registration successful".to_string(),
        })
    }

    pub async fn login(&self, payload: LoginUserModel) -> UseCaseResult<AuthResponseModel> {
        let email = payload.email.trim().to_string();

        if !is_valid_email(&email) {
            return Err(validation_error("Invalid email format"));
        }

        let user = self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(|err| {
                error!(email = %email, db_error = ?err, "auth: failed to load user for login");
                AuthError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = AuthError::InvalidCredentials;
                warn!(
                    email = %email,
                    status = err.status_code().as_u16(),
                    "auth: login rejected, unknown email"
                );
                err
            })?;

        if !verify_password(&payload.password, &user.password_hash) {
            let err = AuthError::InvalidCredentials;
            warn!(
                user_id = %user.id,
                status = err.status_code().as_u16(),
                "auth: login rejected, password mismatch"
            );
            return Err(err);
        }

        let token = issue_jwt(user.id, &user.email).map_err(|err| {
            error!(user_id = %user.id, error = ?err, "auth: failed to issue token");
            AuthError::Internal(err)
        })?;

        info!(user_id = %user.id, "auth: user logged in");

        Ok(AuthResponseModel {
            user: user.into(),
            token,
            message: "Login successful".to_string(),
        })
    }
}

fn validation_error(message: &str) -> AuthError {
    let err = AuthError::Validation(message.to_string());
    warn!(
        status = err.status_code().as_u16(),
        message, "auth: validation failed"
    );
    err
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("password hashing failed: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Basic email validation: one `@`, non-empty local part, dotted domain.
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crates::domain::{
        entities::users::UserEntity, repositories::users::MockUserRepository,
    };
    use mockall::predicate::eq;
    use std::env;
    use uuid::Uuid;

    fn set_env_vars() {
        unsafe {
            env::set_var("JWT_SECRET", "supersecretjwtsecretforunittesting123");
            env::set_var("JWT_EXPIRY_DAYS", "30");
        }
    }

    fn sample_user(email: &str, password: &str) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: "User".to_string(),
            password_hash: hash_password(password).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn register_creates_user_and_returns_token() {
        set_env_vars();
        let mut user_repo = MockUserRepository::new();

        user_repo
            .expect_find_by_email()
            .with(eq("new@example.com"))
            .returning(|_| Box::pin(async { Ok(None) }));

        user_repo.expect_insert().returning(|insert| {
            Box::pin(async move {
                let now = Utc::now();
                Ok(UserEntity {
                    id: Uuid::new_v4(),
                    email: insert.email,
                    name: insert.name,
                    password_hash: insert.password_hash,
                    created_at: now,
                    updated_at: now,
                })
            })
        });

        let usecase = AuthUseCase::new(Arc::new(user_repo));
        let response = usecase
            .register(RegisterUserModel {
                email: "  new@example.com ".to_string(),
                password: "password123".to_string(),
                name: " New User ".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.message, "Registration successful");
        assert_eq!(response.user.email, "new@example.com");
        assert_eq!(response.user.name, "New User");
        assert!(!response.token.is_empty());
    }

    #[tokio::test]
    async fn register_stores_argon2_hash_not_plaintext() {
        set_env_vars();
        let mut user_repo = MockUserRepository::new();

        user_repo
            .expect_find_by_email()
            .returning(|_| Box::pin(async { Ok(None) }));

        user_repo.expect_insert().returning(|insert| {
            assert!(insert.password_hash.starts_with("$argon2"));
            assert_ne!(insert.password_hash, "password123");
            Box::pin(async move {
                let now = Utc::now();
                Ok(UserEntity {
                    id: Uuid::new_v4(),
                    email: insert.email,
                    name: insert.name,
                    password_hash: insert.password_hash,
                    created_at: now,
                    updated_at: now,
                })
            })
        });

        let usecase = AuthUseCase::new(Arc::new(user_repo));
        usecase
            .register(RegisterUserModel {
                email: "new@example.com".to_string(),
                password: "password123".to_string(),
                name: "New User".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let usecase = AuthUseCase::new(Arc::new(MockUserRepository::new()));

        let err = usecase
            .register(RegisterUserModel {
                email: "not-an-email".to_string(),
                password: "password123".to_string(),
                name: "User".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid email format");
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn register_rejects_overlong_email() {
        let usecase = AuthUseCase::new(Arc::new(MockUserRepository::new()));
        let email = format!("{}@example.com", "a".repeat(250));

        let err = usecase
            .register(RegisterUserModel {
                email,
                password: "password123".to_string(),
                name: "User".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Email is too long (max 255 characters)");
    }

    #[tokio::test]
    async fn register_rejects_blank_name() {
        let usecase = AuthUseCase::new(Arc::new(MockUserRepository::new()));

        let err = usecase
            .register(RegisterUserModel {
                email: "new@example.com".to_string(),
                password: "password123".to_string(),
                name: "   ".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Name cannot be empty");
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let usecase = AuthUseCase::new(Arc::new(MockUserRepository::new()));

        let err = usecase
            .register(RegisterUserModel {
                email: "new@example.com".to_string(),
                password: "short".to_string(),
                name: "User".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Password must be at least 8 characters long"
        );
    }

    #[tokio::test]
    async fn register_conflicts_on_existing_email() {
        let mut user_repo = MockUserRepository::new();
        let existing = sample_user("taken@example.com", "password123");

        user_repo
            .expect_find_by_email()
            .with(eq("taken@example.com"))
            .returning(move |_| {
                let existing = existing.clone();
                Box::pin(async move { Ok(Some(existing)) })
            });

        let usecase = AuthUseCase::new(Arc::new(user_repo));
        let err = usecase
            .register(RegisterUserModel {
                email: "taken@example.com".to_string(),
                password: "password123".to_string(),
                name: "User".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::EmailTaken));
        assert_eq!(err.status_code().as_u16(), 409);
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn login_succeeds_with_correct_password() {
        set_env_vars();
        let mut user_repo = MockUserRepository::new();
        let user = sample_user("user@example.com", "password123");
        let user_id = user.id;

        user_repo
            .expect_find_by_email()
            .with(eq("user@example.com"))
            .returning(move |_| {
                let user = user.clone();
                Box::pin(async move { Ok(Some(user)) })
            });

        let usecase = AuthUseCase::new(Arc::new(user_repo));
        let response = usecase
            .login(LoginUserModel {
                email: "user@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.message, "Login successful");
        assert_eq!(response.user.id, user_id);
        assert!(!response.token.is_empty());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        set_env_vars();
        let mut user_repo = MockUserRepository::new();
        let user = sample_user("user@example.com", "password123");

        user_repo
            .expect_find_by_email()
            .returning(move |_| {
                let user = user.clone();
                Box::pin(async move { Ok(Some(user)) })
            });

        let usecase = AuthUseCase::new(Arc::new(user_repo));
        let err = usecase
            .login(LoginUserModel {
                email: "user@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.status_code().as_u16(), 401);
    }

    #[tokio::test]
    async fn login_rejects_unknown_email_with_same_message() {
        let mut user_repo = MockUserRepository::new();

        user_repo
            .expect_find_by_email()
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = AuthUseCase::new(Arc::new(user_repo));
        let err = usecase
            .login(LoginUserModel {
                email: "ghost@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid email or password");
    }
}
