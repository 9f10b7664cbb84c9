use std::sync::Arc;

use crates::domain::{
    repositories::{
        subscriptions::SubscriptionRepository, transactions::TransactionRepository,
        users::UserRepository,
    },
    value_objects::access::LimitDecision,
};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::usecases::access_policy::{AccessPolicyError, AccessPolicyUseCase};

#[derive(Debug, Error)]
pub enum UsageLimitError {
    #[error(
        "Transaction limit reached. You have used {current} of {max} free transactions. Please upgrade to add more."
    )]
    LimitReached { current: i64, max: i64 },
    #[error(transparent)]
    Access(#[from] AccessPolicyError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl UsageLimitError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            UsageLimitError::LimitReached { .. } => StatusCode::PAYMENT_REQUIRED,
            UsageLimitError::Access(err) => err.status_code(),
            UsageLimitError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, UsageLimitError>;

/// Applies the free-tier usage ceiling on top of the access decision. Paid
/// subscribers are never counted; trial and free users share the same `max`.
pub struct UsageLimitUseCase<U, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    access_policy: Arc<AccessPolicyUseCase<U, S>>,
    transaction_repo: Arc<T>,
    max_free_transactions: i64,
}

impl<U, S, T> UsageLimitUseCase<U, S, T>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
{
    pub fn new(
        access_policy: Arc<AccessPolicyUseCase<U, S>>,
        transaction_repo: Arc<T>,
        max_free_transactions: i64,
    ) -> Self {
        Self {
            access_policy,
            transaction_repo,
            max_free_transactions,
        }
    }

    /// Never denies on its own; the decision says whether an insert is
    /// allowed and why. The count re-reads storage on every call, so two
    /// concurrent inserts can both pass against the same stale count.
    pub async fn check_limit(&self, user_id: Uuid) -> UseCaseResult<LimitDecision> {
        let access = self.access_policy.evaluate(user_id, true).await?;

        if access.has_active_subscription {
            return Ok(LimitDecision {
                can_add: true,
                limit_reached: false,
                current: None,
                max: None,
                reason: "paid_subscription".to_string(),
            });
        }

        let current = self
            .transaction_repo
            .count_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "usage_limit: failed to count transactions");
                UsageLimitError::Internal(err)
            })?;

        let max = self.max_free_transactions;
        let can_add = current < max;
        let reason = if !can_add {
            "limit_reached"
        } else if access.is_in_free_trial {
            "free_trial"
        } else {
            "free_tier"
        };

        debug!(
            %user_id,
            current,
            max,
            can_add,
            reason,
            "usage_limit: checked transaction ceiling"
        );

        Ok(LimitDecision {
            can_add,
            limit_reached: !can_add,
            current: Some(current),
            max: Some(max),
            reason: reason.to_string(),
        })
    }

    /// Gate for the transaction-creation path only.
    pub async fn require_limit(&self, user_id: Uuid) -> UseCaseResult<LimitDecision> {
        let decision = self.check_limit(user_id).await?;

        if !decision.can_add {
            let err = UsageLimitError::LimitReached {
                current: decision.current.unwrap_or(0),
                max: decision.max.unwrap_or(self.max_free_transactions),
            };
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "usage_limit: transaction ceiling reached"
            );
            return Err(err);
        }

        Ok(decision)
    }
}
