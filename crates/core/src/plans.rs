//! Plan tiers and their entitlements. Caps use `Option`: `None` means
//! unlimited (Business tier).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Pro,
    Business,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Business => "business",
        }
    }

    /// Unknown tier strings fall back to starter, matching how merchants
    /// created before a tier existed are treated.
    pub fn parse_or_starter(value: &str) -> Self {
        match value {
            "pro" => Self::Pro,
            "business" => Self::Business,
            _ => Self::Starter,
        }
    }

    pub fn config(&self) -> PlanConfig {
        match self {
            Self::Starter => PlanConfig {
                label: "Starter",
                monthly_price: Decimal::from(15_000),
                max_products: Some(50),
                max_messages_per_month: Some(500),
                auto_follow_up: false,
                weekly_report: false,
                priority_support: false,
            },
            Self::Pro => PlanConfig {
                label: "Pro",
                monthly_price: Decimal::from(35_000),
                max_products: Some(200),
                max_messages_per_month: Some(2_000),
                auto_follow_up: true,
                weekly_report: true,
                priority_support: false,
            },
            Self::Business => PlanConfig {
                label: "Business",
                monthly_price: Decimal::from(70_000),
                max_products: None,
                max_messages_per_month: None,
                auto_follow_up: true,
                weekly_report: true,
                priority_support: true,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlanConfig {
    pub label: &'static str,
    pub monthly_price: Decimal,
    pub max_products: Option<u32>,
    pub max_messages_per_month: Option<u32>,
    pub auto_follow_up: bool,
    pub weekly_report: bool,
    pub priority_support: bool,
}

impl PlanConfig {
    /// Quota gate for assistant replies this calendar month.
    pub fn is_message_quota_exceeded(&self, messages_this_month: u32) -> bool {
        match self.max_messages_per_month {
            Some(cap) => messages_this_month >= cap,
            None => false,
        }
    }

    pub fn can_add_product(&self, current_product_count: u32) -> bool {
        match self.max_products {
            Some(cap) => current_product_count < cap,
            None => true,
        }
    }
}
