use std::sync::Arc;

use chrono::{Duration, Utc};
use crates::domain::{
    repositories::{
        subscriptions::SubscriptionRepository, transactions::TransactionRepository,
        users::UserRepository,
    },
    value_objects::{
        access::LimitDecision,
        subscriptions::SubscriptionView,
        users::{AccessFlagsModel, LimitInfoModel, UserStatusModel},
    },
};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::usecases::{
    access_policy::{AccessPolicyError, AccessPolicyUseCase},
    usage_limit::{UsageLimitError, UsageLimitUseCase},
};

#[derive(Debug, Error)]
pub enum UserStatusError {
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl UserStatusError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            UserStatusError::UserNotFound => StatusCode::NOT_FOUND,
            UserStatusError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AccessPolicyError> for UserStatusError {
    fn from(err: AccessPolicyError) -> Self {
        match err {
            AccessPolicyError::UserNotFound => UserStatusError::UserNotFound,
            AccessPolicyError::Internal(inner) => UserStatusError::Internal(inner),
            other => UserStatusError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<UsageLimitError> for UserStatusError {
    fn from(err: UsageLimitError) -> Self {
        match err {
            UsageLimitError::Access(inner) => inner.into(),
            UsageLimitError::Internal(inner) => UserStatusError::Internal(inner),
            other => UserStatusError::Internal(anyhow::Error::new(other)),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, UserStatusError>;

/// Aggregates the account, the subscription snapshot, the access decision and
/// the usage ceiling into the single overview the client renders. The access
/// flags come from the same evaluation path the write gates use, so what this
/// reports is what a create attempt would actually hit.
pub struct UserStatusUseCase<U, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    access_policy: Arc<AccessPolicyUseCase<U, S>>,
    usage_limit: Arc<UsageLimitUseCase<U, S, T>>,
    free_trial_days: i64,
}

impl<U, S, T> UserStatusUseCase<U, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        access_policy: Arc<AccessPolicyUseCase<U, S>>,
        usage_limit: Arc<UsageLimitUseCase<U, S, T>>,
        free_trial_days: i64,
    ) -> Self {
        Self {
            user_repo,
            access_policy,
            usage_limit,
            free_trial_days,
        }
    }

    pub async fn status(&self, user_id: Uuid) -> UseCaseResult<UserStatusModel> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "user_status: failed to load user");
                UserStatusError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = UserStatusError::UserNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "user_status: user not found"
                );
                err
            })?;

        let decision = self.access_policy.evaluate(user_id, true).await?;
        let limit = self.usage_limit.check_limit(user_id).await?;

        let subscription = decision
            .subscription
            .as_ref()
            .map(|entity| SubscriptionView::from_entity(entity, decision.has_active_subscription));

        let trial_ends_at = user.created_at + Duration::days(self.free_trial_days);
        let days_left = if decision.is_in_free_trial {
            let seconds = (trial_ends_at - Utc::now()).num_seconds().max(0);
            (seconds + 86_399) / 86_400
        } else {
            0
        };

        debug!(
            %user_id,
            has_active_subscription = decision.has_active_subscription,
            can_add = limit.can_add,
            days_left,
            "user_status: assembled"
        );

        Ok(UserStatusModel {
            user: user.into(),
            subscription,
            access: AccessFlagsModel {
                has_active_subscription: decision.has_active_subscription,
                can_add_transactions: limit.can_add,
                limit_reached: limit.limit_reached,
                is_in_free_trial: decision.is_in_free_trial,
            },
            limits: build_limit_info(&limit, days_left),
        })
    }
}

/// Paid users carry no counters, so `current`/`max` being unset doubles as
/// the "no limits apply" marker.
fn build_limit_info(limit: &LimitDecision, days_left: i64) -> Option<LimitInfoModel> {
    let current = limit.current?;
    let max = limit.max?;

    Some(match limit.reason.as_str() {
        "limit_reached" => LimitInfoModel::TransactionLimit {
            message: format!(
                "You have reached the free tier limit of {} transactions. Please upgrade to continue.",
                max
            ),
            current,
            max,
        },
        "free_trial" => LimitInfoModel::FreeTrial {
            message: "You are in free trial period".to_string(),
            days_left,
            transactions_used: current,
            transaction_limit: max,
        },
        _ => LimitInfoModel::FreeTier {
            message: "You are using the free tier".to_string(),
            transactions_used: current,
            transaction_limit: max,
            remaining: max - current,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use crates::domain::{
        entities::{subscriptions::SubscriptionEntity, users::UserEntity},
        repositories::{
            subscriptions::MockSubscriptionRepository, transactions::MockTransactionRepository,
            users::MockUserRepository,
        },
    };
    use mockall::predicate::eq;

    const FREE_TRIAL_DAYS: i64 = 60;
    const FREE_MAX_TRANSACTIONS: i64 = 50;

    fn sample_user(id: Uuid, created_at: DateTime<Utc>) -> UserEntity {
        UserEntity {
            id,
            email: "user@example.com".to_string(),
            name: "User".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    fn snapshot(user_id: Uuid, status: &str) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            stripe_customer_id: Some("cus_123".to_string()),
            stripe_subscription_id: Some("sub_123".to_string()),
            plan: "monthly".to_string(),
            status: status.to_string(),
            current_period_end: Some(now + Duration::days(20)),
            created_at: now,
            updated_at: now,
        }
    }

    fn usecase_with(
        user: Option<UserEntity>,
        subscription: Option<SubscriptionEntity>,
        transaction_count: Option<i64>,
        user_id: Uuid,
    ) -> UserStatusUseCase<MockUserRepository, MockSubscriptionRepository, MockTransactionRepository>
    {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_id()
            .with(eq(user_id))
            .returning(move |_| {
                let user = user.clone();
                Box::pin(async move { Ok(user) })
            });

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .with(eq(user_id))
            .returning(move |_| {
                let subscription = subscription.clone();
                Box::pin(async move { Ok(subscription) })
            });

        // Leaving the count expectation unset asserts paid users never count.
        let mut transaction_repo = MockTransactionRepository::new();
        if let Some(count) = transaction_count {
            transaction_repo
                .expect_count_by_user_id()
                .with(eq(user_id))
                .returning(move |_| Box::pin(async move { Ok(count) }));
        }

        let user_repo = Arc::new(user_repo);
        let subscription_repo = Arc::new(subscription_repo);
        let transaction_repo = Arc::new(transaction_repo);

        let access_policy = Arc::new(AccessPolicyUseCase::new(
            Arc::clone(&user_repo),
            Arc::clone(&subscription_repo),
            FREE_TRIAL_DAYS,
        ));
        let usage_limit = Arc::new(UsageLimitUseCase::new(
            Arc::clone(&access_policy),
            Arc::clone(&transaction_repo),
            FREE_MAX_TRANSACTIONS,
        ));

        UserStatusUseCase::new(user_repo, access_policy, usage_limit, FREE_TRIAL_DAYS)
    }

    #[tokio::test]
    async fn paid_subscriber_has_no_limits_block() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(365));

        let usecase = usecase_with(Some(user), Some(snapshot(user_id, "active")), None, user_id);
        let status = usecase.status(user_id).await.unwrap();

        assert!(status.access.has_active_subscription);
        assert!(status.access.can_add_transactions);
        assert!(!status.access.limit_reached);
        assert!(status.limits.is_none());

        let subscription = status.subscription.unwrap();
        assert!(subscription.is_active);
        assert_eq!(subscription.plan, "monthly");
        assert_eq!(subscription.stripe_customer_id.as_deref(), Some("cus_123"));
    }

    #[tokio::test]
    async fn trial_user_sees_days_left() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(10));

        let usecase = usecase_with(Some(user), None, Some(5), user_id);
        let status = usecase.status(user_id).await.unwrap();

        assert!(status.access.is_in_free_trial);
        assert!(status.access.can_add_transactions);
        assert!(status.subscription.is_none());
        match status.limits {
            Some(LimitInfoModel::FreeTrial {
                message,
                days_left,
                transactions_used,
                transaction_limit,
            }) => {
                assert_eq!(message, "You are in free trial period");
                assert_eq!(days_left, 50);
                assert_eq!(transactions_used, 5);
                assert_eq!(transaction_limit, FREE_MAX_TRANSACTIONS);
            }
            other => panic!("expected free_trial limits, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn capped_free_user_gets_upgrade_prompt() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(100));

        let usecase = usecase_with(Some(user), None, Some(50), user_id);
        let status = usecase.status(user_id).await.unwrap();

        assert!(!status.access.can_add_transactions);
        assert!(status.access.limit_reached);
        match status.limits {
            Some(LimitInfoModel::TransactionLimit {
                message,
                current,
                max,
            }) => {
                assert_eq!(
                    message,
                    "You have reached the free tier limit of 50 transactions. Please upgrade to continue."
                );
                assert_eq!(current, 50);
                assert_eq!(max, 50);
            }
            other => panic!("expected transaction_limit limits, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn free_tier_user_sees_remaining_allowance() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(100));

        let usecase = usecase_with(Some(user), None, Some(20), user_id);
        let status = usecase.status(user_id).await.unwrap();

        assert!(status.access.can_add_transactions);
        assert!(!status.access.is_in_free_trial);
        match status.limits {
            Some(LimitInfoModel::FreeTier {
                message,
                transactions_used,
                transaction_limit,
                remaining,
            }) => {
                assert_eq!(message, "You are using the free tier");
                assert_eq!(transactions_used, 20);
                assert_eq!(transaction_limit, 50);
                assert_eq!(remaining, 30);
            }
            other => panic!("expected free_tier limits, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn canceled_subscription_is_reported_inactive() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(100));

        let usecase = usecase_with(
            Some(user),
            Some(snapshot(user_id, "canceled")),
            Some(10),
            user_id,
        );
        let status = usecase.status(user_id).await.unwrap();

        assert!(!status.access.has_active_subscription);
        let subscription = status.subscription.unwrap();
        assert!(!subscription.is_active);
        assert_eq!(subscription.status, "canceled");
        assert!(matches!(
            status.limits,
            Some(LimitInfoModel::FreeTier { .. })
        ));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let user_id = Uuid::new_v4();

        let usecase = usecase_with(None, None, None, user_id);
        let err = usecase.status(user_id).await.unwrap_err();

        assert!(matches!(err, UserStatusError::UserNotFound));
        assert_eq!(err.status_code().as_u16(), 404);
        assert_eq!(err.to_string(), "User not found");
    }
}
