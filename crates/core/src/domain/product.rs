use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::merchant::MerchantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub merchant_id: MerchantId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub category: String,
    pub is_available: bool,
}

impl Product {
    /// Invariant: `is_available` is true only while stock remains.
    pub fn availability_consistent(&self) -> bool {
        self.is_available == (self.stock > 0)
    }
}
