pub mod auth;
pub mod payments;
pub mod stripe_webhook;
pub mod transactions;
pub mod user_status;
