use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::format_amount;
use crate::domain::customer::CustomerId;
use crate::domain::merchant::MerchantId;
use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "preparing" => Some(Self::Preparing),
            "ready" => Some(Self::Ready),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Line items snapshot the product name and unit price at creation time;
/// later catalog edits never alter historical orders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub items: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_address: String,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Forward-only lifecycle; `cancelled` is reachable from any
    /// non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Confirmed, OrderStatus::Preparing)
                | (OrderStatus::Preparing, OrderStatus::Ready)
                | (OrderStatus::Ready, OrderStatus::Delivered)
        ) || (next == OrderStatus::Cancelled && !self.status.is_terminal())
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }
        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }

    /// Confirmation summary sent to the customer right after creation.
    pub fn to_whatsapp(&self, currency: &str) -> String {
        let mut lines = vec![
            "✅ *COMMANDE CONFIRMÉE*".to_string(),
            format!("N° {}", self.order_number),
            String::new(),
            "*Vos articles :*".to_string(),
        ];
        for item in &self.items {
            lines.push(format!(
                "  - {} x{} - {} {}",
                item.name,
                item.quantity,
                format_amount(item.total),
                currency
            ));
        }
        lines.push(String::new());
        lines.push(format!("Total : {} {}", format_amount(self.total_amount), currency));
        lines.push(format!("Paiement : {}", self.payment_method.replace('_', " ")));
        lines.push(String::new());
        lines.push("Nous vous contactons dès que votre commande est prête !".to_string());
        lines.join("\n")
    }

    pub fn status_message(&self) -> String {
        let headline = match self.status {
            OrderStatus::Confirmed => "✅ Commande confirmée !",
            OrderStatus::Preparing => "👨‍🍳 En cours de préparation.",
            OrderStatus::Ready => "🎉 Prête ! Livraison en route.",
            OrderStatus::Delivered => "📦 Livrée. Merci !",
            OrderStatus::Cancelled => "❌ Annulée.",
            OrderStatus::Pending => "Statut mis à jour.",
        };
        format!("{headline}\n\nN° *{}*", self.order_number)
    }
}

/// Human-legible order number: prefix, date component, random suffix.
/// Treated as unique-enough; the unique index on the column turns a
/// collision into a reportable persistence error.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("CMD-{}-{}", now.format("%Y%m%d"), suffix)
}
