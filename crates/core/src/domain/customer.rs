use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::merchant::MerchantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// One record per (merchant, WhatsApp number) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub merchant_id: MerchantId,
    pub whatsapp_number: String,
    pub name: Option<String>,
    pub total_orders: u32,
    pub total_spent: Decimal,
    pub last_interaction: DateTime<Utc>,
    pub last_order_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn new(merchant_id: MerchantId, whatsapp_number: impl Into<String>) -> Self {
        Self {
            id: CustomerId(uuid::Uuid::new_v4().to_string()),
            merchant_id,
            whatsapp_number: whatsapp_number.into(),
            name: None,
            total_orders: 0,
            total_spent: Decimal::ZERO,
            last_interaction: Utc::now(),
            last_order_at: None,
        }
    }

    /// First write wins: a name confirmed once is never overwritten by a
    /// later model detection.
    pub fn learn_name(&mut self, name: &str) -> bool {
        if self.name.is_some() || name.trim().is_empty() {
            return false;
        }
        self.name = Some(name.trim().to_string());
        true
    }
}
