use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BillingPlan {
    Monthly,
    Yearly,
}

impl BillingPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPlan::Monthly => "monthly",
            BillingPlan::Yearly => "yearly",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(BillingPlan::Monthly),
            "yearly" => Some(BillingPlan::Yearly),
            _ => None,
        }
    }
}

impl Display for BillingPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
