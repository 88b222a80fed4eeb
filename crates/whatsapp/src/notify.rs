use std::sync::Arc;

use secrecy::SecretString;
use tracing::warn;

use boutiq_core::config::NotificationsConfig;
use boutiq_core::domain::merchant::{Merchant, PhoneNumberId};
use boutiq_core::domain::order::Order;

use crate::gateway::MessagingGateway;

/// Alerts a merchant's owner contact when a new order lands. Uses one
/// process-wide sender credential, separate from the per-merchant
/// customer-facing endpoints. Failures are logged and swallowed: order
/// persistence never depends on the alert going out.
pub struct OrderNotifier {
    gateway: Arc<dyn MessagingGateway>,
    sender: Option<(PhoneNumberId, SecretString)>,
}

impl OrderNotifier {
    pub fn new(gateway: Arc<dyn MessagingGateway>, config: &NotificationsConfig) -> Self {
        let sender = if config.enabled {
            match (&config.phone_number_id, &config.token) {
                (Some(phone_number_id), Some(token)) => {
                    Some((PhoneNumberId(phone_number_id.clone()), token.clone()))
                }
                _ => None,
            }
        } else {
            None
        };
        Self { gateway, sender }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    pub async fn notify_new_order(&self, merchant: &Merchant, order: &Order) {
        let Some((endpoint, credential)) = &self.sender else {
            return;
        };
        if merchant.owner_phone.is_empty() {
            return;
        }

        let text = format!(
            "🛍️ Nouvelle commande !\n\nN° {}\nTotal : {} {}\nBoutique : {}",
            order.order_number,
            boutiq_core::catalog::format_amount(order.total_amount),
            merchant.currency,
            merchant.name,
        );

        if let Err(error) =
            self.gateway.send_text(endpoint, credential, &merchant.owner_phone, &text).await
        {
            warn!(
                event_name = "notify.order.failed",
                merchant_id = %merchant.id.0,
                order_number = %order.order_number,
                error = %error,
                "merchant order notification failed"
            );
        }
    }
}
