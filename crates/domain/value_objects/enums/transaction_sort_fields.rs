use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TransactionSortField {
    #[default]
    Date,
    Amount,
    CreatedAt,
}

impl TransactionSortField {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "date" => Some(TransactionSortField::Date),
            "amount" => Some(TransactionSortField::Amount),
            "created_at" => Some(TransactionSortField::CreatedAt),
            _ => None,
        }
    }
}
