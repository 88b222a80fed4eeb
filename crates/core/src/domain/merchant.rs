use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::plans::PlanTier;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MerchantId(pub String);

/// WhatsApp Business endpoint identifier. Exactly one active merchant is
/// addressable through a given endpoint at a time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumberId(pub String);

#[derive(Clone, Debug)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    pub owner_phone: String,
    pub phone_number_id: PhoneNumberId,
    pub whatsapp_token: SecretString,
    pub business_description: String,
    pub ai_persona: String,
    pub city: String,
    pub country: String,
    pub currency: String,
    pub is_active: bool,
    pub plan: PlanTier,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    /// An absent expiry means the merchant never completed a payment and
    /// is treated as expired.
    pub fn is_subscription_active(&self, now: DateTime<Utc>) -> bool {
        match self.subscription_expires_at {
            Some(expires_at) => expires_at > now,
            None => false,
        }
    }
}
