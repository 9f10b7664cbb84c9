use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::users::UserEntity;
use crate::domain::value_objects::subscriptions::SubscriptionView;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserModel {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserEntity> for UserModel {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            email: entity.email,
            name: entity.name,
            created_at: entity.created_at,
        }
    }
}

/// Slim user shape returned by register/login.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthUserModel {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<UserEntity> for AuthUserModel {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            email: entity.email,
            name: entity.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserModel {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginUserModel {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponseModel {
    pub user: AuthUserModel,
    pub token: String,
    pub message: String,
}

/// Aggregated account overview for the status endpoint.
#[derive(Debug, Serialize)]
pub struct UserStatusModel {
    pub user: UserModel,
    pub subscription: Option<SubscriptionView>,
    pub access: AccessFlagsModel,
    pub limits: Option<LimitInfoModel>,
}

#[derive(Debug, Serialize)]
pub struct AccessFlagsModel {
    pub has_active_subscription: bool,
    pub can_add_transactions: bool,
    pub limit_reached: bool,
    pub is_in_free_trial: bool,
}

/// Free-tier usage details; absent for users with an active subscription.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum LimitInfoModel {
    #[serde(rename = "transaction_limit")]
    TransactionLimit {
        message: String,
        current: i64,
        max: i64,
    },
    #[serde(rename = "free_trial")]
    FreeTrial {
        message: String,
        days_left: i64,
        transactions_used: i64,
        transaction_limit: i64,
    },
    #[serde(rename = "free_tier")]
    FreeTier {
        message: String,
        transactions_used: i64,
        transaction_limit: i64,
        remaining: i64,
    },
}
