use crate::domain::entities::subscriptions::SubscriptionEntity;

/// Outcome of one access evaluation. Computed per request, never persisted.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub has_access: bool,
    pub has_active_subscription: bool,
    pub is_in_free_trial: bool,
    pub subscription: Option<SubscriptionEntity>,
    pub reason: Option<String>,
}

/// Outcome of one usage-ceiling check. `current` and `max` are only
/// populated for users on the free tier; paid users are never counted.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitDecision {
    pub can_add: bool,
    pub limit_reached: bool,
    pub current: Option<i64>,
    pub max: Option<i64>,
    pub reason: String,
}
