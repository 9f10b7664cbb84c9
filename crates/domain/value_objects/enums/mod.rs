pub mod billing_plans;
pub mod sort_order;
pub mod subscription_statuses;
pub mod transaction_kinds;
pub mod transaction_sort_fields;
