pub mod subscriptions;
pub mod transactions;
pub mod users;
