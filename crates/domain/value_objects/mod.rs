pub mod access;
pub mod enums;
pub mod subscriptions;
pub mod transactions;
pub mod users;
