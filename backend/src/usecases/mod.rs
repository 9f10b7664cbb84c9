pub mod access_policy;
pub mod auth;
pub mod billing_events;
pub mod checkout;
pub mod transactions;
pub mod usage_limit;
pub mod user_status;
