use std::sync::Arc;

use chrono::{Duration, Utc};
use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
    value_objects::{
        access::AccessDecision, enums::subscription_statuses::SubscriptionStatus,
    },
};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AccessPolicyError {
    #[error("User not found")]
    UserNotFound,
    #[error("Active subscription required. Please upgrade your plan.")]
    PaymentRequired,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AccessPolicyError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AccessPolicyError::UserNotFound => StatusCode::NOT_FOUND,
            AccessPolicyError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            AccessPolicyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AccessPolicyError>;

/// Decides whether a user may act, combining account age, the billing
/// snapshot and the free-trial window into one decision.
pub struct AccessPolicyUseCase<U, S>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    free_trial_days: i64,
}

impl<U, S> AccessPolicyUseCase<U, S>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, subscription_repo: Arc<S>, free_trial_days: i64) -> Self {
        Self {
            user_repo,
            subscription_repo,
            free_trial_days,
        }
    }

    /// Computes a fresh access decision; reads only, never writes.
    pub async fn evaluate(
        &self,
        user_id: Uuid,
        allow_free_trial: bool,
    ) -> UseCaseResult<AccessDecision> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "access_policy: failed to load user");
                AccessPolicyError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = AccessPolicyError::UserNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "access_policy: user not found"
                );
                err
            })?;

        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "access_policy: failed to load subscription snapshot"
                );
                AccessPolicyError::Internal(err)
            })?;

        let has_active_subscription = subscription
            .as_ref()
            .map(Self::snapshot_is_active)
            .unwrap_or(false);

        let trial_ends_at = user.created_at + Duration::days(self.free_trial_days);
        let is_in_free_trial = Utc::now() < trial_ends_at;

        let has_access = has_active_subscription || (allow_free_trial && is_in_free_trial);
        let reason = if has_access {
            None
        } else {
            Some("subscription_required".to_string())
        };

        debug!(
            %user_id,
            has_access,
            has_active_subscription,
            is_in_free_trial,
            "access_policy: evaluated"
        );

        Ok(AccessDecision {
            has_access,
            has_active_subscription,
            is_in_free_trial,
            subscription,
            reason,
        })
    }

    /// Gate for protected endpoints; denial maps to 402.
    pub async fn require_access(
        &self,
        user_id: Uuid,
        allow_free_trial: bool,
    ) -> UseCaseResult<AccessDecision> {
        let decision = self.evaluate(user_id, allow_free_trial).await?;

        if !decision.has_access {
            let err = AccessPolicyError::PaymentRequired;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                reason = ?decision.reason,
                "access_policy: access denied"
            );
            return Err(err);
        }

        Ok(decision)
    }

    /// `past_due` keeps access unconditionally (grace period); `active` and
    /// `trialing` are bounded by `current_period_end` when one is set. The
    /// status string is the provider's verbatim value, so anything we do not
    /// recognize counts as inactive.
    fn snapshot_is_active(subscription: &SubscriptionEntity) -> bool {
        match SubscriptionStatus::from_str(&subscription.status) {
            Some(SubscriptionStatus::PastDue) => true,
            Some(SubscriptionStatus::Active) | Some(SubscriptionStatus::Trialing) => subscription
                .current_period_end
                .map(|period_end| period_end > Utc::now())
                .unwrap_or(true),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use crates::domain::{
        entities::users::UserEntity,
        repositories::{
            subscriptions::MockSubscriptionRepository, users::MockUserRepository,
        },
    };
    use mockall::predicate::eq;

    const FREE_TRIAL_DAYS: i64 = 60;

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

    fn sample_subscription(
        user_id: Uuid,
        status: &str,
        current_period_end: Option<DateTime<Utc>>,
    ) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            stripe_customer_id: Some("cus_123".to_string()),
            stripe_subscription_id: Some("sub_123".to_string()),
            plan: "monthly".to_string(),
            status: status.to_string(),
            current_period_end,
            created_at: now,
            updated_at: now,
        }
    }

    fn usecase_with(
        user: Option<UserEntity>,
        subscription: Option<SubscriptionEntity>,
        user_id: Uuid,
    ) -> AccessPolicyUseCase<MockUserRepository, MockSubscriptionRepository> {
        let mut user_repo = MockUserRepository::new();
        let mut subscription_repo = MockSubscriptionRepository::new();

        user_repo
            .expect_find_by_id()
            .with(eq(user_id))
            .returning(move |_| {
                let user = user.clone();
                Box::pin(async move { Ok(user) })
            });

        subscription_repo
            .expect_find_by_user_id()
            .with(eq(user_id))
            .returning(move |_| {
                let subscription = subscription.clone();
                Box::pin(async move { Ok(subscription) })
            });

        AccessPolicyUseCase::new(
            Arc::new(user_repo),
            Arc::new(subscription_repo),
            FREE_TRIAL_DAYS,
        )
    }

    #[tokio::test]
    async fn active_subscription_grants_access() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(365));
        let subscription =
            sample_subscription(user_id, "active", Some(Utc::now() + Duration::days(20)));

        let usecase = usecase_with(Some(user), Some(subscription), user_id);
        let decision = usecase.evaluate(user_id, true).await.unwrap();

        assert!(decision.has_access);
        assert!(decision.has_active_subscription);
        assert!(!decision.is_in_free_trial);
        assert!(decision.reason.is_none());
        assert!(decision.subscription.is_some());
    }

    #[tokio::test]
    async fn null_period_end_counts_as_active() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(365));
        let subscription = sample_subscription(user_id, "active", None);

        let usecase = usecase_with(Some(user), Some(subscription), user_id);
        let decision = usecase.evaluate(user_id, true).await.unwrap();

        assert!(decision.has_active_subscription);
    }

    #[tokio::test]
    async fn past_due_keeps_access_even_with_expired_period() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(365));
        let subscription =
            sample_subscription(user_id, "past_due", Some(Utc::now() - Duration::days(5)));

        let usecase = usecase_with(Some(user), Some(subscription), user_id);
        let decision = usecase.evaluate(user_id, true).await.unwrap();

        assert!(decision.has_access);
        assert!(decision.has_active_subscription);
    }

    #[tokio::test]
    async fn expired_active_subscription_is_not_active() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(365));
        let subscription =
            sample_subscription(user_id, "active", Some(Utc::now() - Duration::hours(1)));

        let usecase = usecase_with(Some(user), Some(subscription), user_id);
        let decision = usecase.evaluate(user_id, true).await.unwrap();

        assert!(!decision.has_active_subscription);
        assert!(!decision.has_access);
        assert_eq!(decision.reason.as_deref(), Some("subscription_required"));
    }

    #[tokio::test]
    async fn canceled_subscription_falls_back_to_trial_window() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(10));
        let subscription =
            sample_subscription(user_id, "canceled", Some(Utc::now() + Duration::days(20)));

        let usecase = usecase_with(Some(user), Some(subscription), user_id);
        let decision = usecase.evaluate(user_id, true).await.unwrap();

        assert!(!decision.has_active_subscription);
        assert!(decision.is_in_free_trial);
        assert!(decision.has_access);
    }

    #[tokio::test]
    async fn unknown_provider_status_counts_as_inactive() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(365));
        let subscription = sample_subscription(user_id, "incomplete_expired", None);

        let usecase = usecase_with(Some(user), Some(subscription), user_id);
        let decision = usecase.evaluate(user_id, true).await.unwrap();

        assert!(!decision.has_active_subscription);
        assert!(!decision.has_access);
    }

    #[tokio::test]
    async fn young_account_without_snapshot_is_in_trial() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(10));

        let usecase = usecase_with(Some(user), None, user_id);
        let decision = usecase.evaluate(user_id, true).await.unwrap();

        assert!(decision.has_access);
        assert!(decision.is_in_free_trial);
        assert!(!decision.has_active_subscription);
        assert!(decision.subscription.is_none());
    }

    #[tokio::test]
    async fn old_account_without_snapshot_is_denied() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(FREE_TRIAL_DAYS + 1));

        let usecase = usecase_with(Some(user), None, user_id);
        let decision = usecase.evaluate(user_id, true).await.unwrap();

        assert!(!decision.has_access);
        assert!(!decision.is_in_free_trial);
        assert_eq!(decision.reason.as_deref(), Some("subscription_required"));
    }

    #[tokio::test]
    async fn trial_is_ignored_when_caller_disallows_it() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(10));

        let usecase = usecase_with(Some(user), None, user_id);
        let decision = usecase.evaluate(user_id, false).await.unwrap();

        assert!(decision.is_in_free_trial);
        assert!(!decision.has_access);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let user_id = Uuid::new_v4();

        let mut user_repo = MockUserRepository::new();
        let subscription_repo = MockSubscriptionRepository::new();

        user_repo
            .expect_find_by_id()
            .with(eq(user_id))
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = AccessPolicyUseCase::new(
            Arc::new(user_repo),
            Arc::new(subscription_repo),
            FREE_TRIAL_DAYS,
        );

        let err = usecase.evaluate(user_id, true).await.unwrap_err();
        assert!(matches!(err, AccessPolicyError::UserNotFound));
        assert_eq!(err.status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn require_access_maps_denial_to_payment_required() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(FREE_TRIAL_DAYS + 30));

        let usecase = usecase_with(Some(user), None, user_id);
        let err = usecase.require_access(user_id, true).await.unwrap_err();

        assert!(matches!(err, AccessPolicyError::PaymentRequired));
        assert_eq!(err.status_code().as_u16(), 402);
        assert_eq!(
            err.to_string(),
            "Active subscription required. Please upgrade your plan."
        );
    }

    #[tokio::test]
    async fn require_access_passes_through_granted_decision() {
        let user_id = Uuid::new_v4();
        let user = sample_user(user_id, Utc::now() - Duration::days(365));
        let subscription = sample_subscription(user_id, "trialing", None);

        let usecase = usecase_with(Some(user), Some(subscription), user_id);
        let decision = usecase.require_access(user_id, true).await.unwrap();

        assert!(decision.has_access);
        assert!(decision.has_active_subscription);
    }
}
