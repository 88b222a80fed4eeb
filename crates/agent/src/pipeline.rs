use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use boutiq_core::actions::{self, AssistantAction};
use boutiq_core::domain::customer::Customer;
use boutiq_core::domain::merchant::{Merchant, MerchantId};
use boutiq_core::domain::product::ProductId;
use boutiq_core::domain::session::{ConversationSession, MessageRole};
use boutiq_core::replies;
use boutiq_db::repositories::{
    CustomerRepository, MerchantRepository, MessageUsageRepository, ProductRepository,
    SessionRepository,
};
use boutiq_whatsapp::gateway::MessagingGateway;
use boutiq_whatsapp::notify::OrderNotifier;
use boutiq_whatsapp::webhook::InboundMessage;

use crate::assistant::AssistantClient;
use crate::orders::OrderWriter;

/// Pause between the conversational reply and the order confirmation so
/// the two arrive as distinct bubbles.
const CONFIRMATION_DELAY: Duration = Duration::from_millis(1_000);

/// Serializes message handling per (merchant, customer) so concurrent
/// webhook deliveries cannot interleave the session read-modify-write.
#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, merchant_id: &MerchantId, customer_number: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // An entry held only by the map is idle; drop it so the map
            // stays bounded by the number of in-flight conversations.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry((merchant_id.0.clone(), customer_number.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked_pairs(&self) -> usize {
        self.inner.lock().await.len()
    }
}

pub struct MessagePipeline {
    merchants: Arc<dyn MerchantRepository>,
    customers: Arc<dyn CustomerRepository>,
    sessions: Arc<dyn SessionRepository>,
    products: Arc<dyn ProductRepository>,
    usage: Arc<dyn MessageUsageRepository>,
    assistant: AssistantClient,
    order_writer: OrderWriter,
    gateway: Arc<dyn MessagingGateway>,
    notifier: OrderNotifier,
    locks: SessionLocks,
    confirmation_delay: Duration,
}

impl MessagePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        merchants: Arc<dyn MerchantRepository>,
        customers: Arc<dyn CustomerRepository>,
        sessions: Arc<dyn SessionRepository>,
        products: Arc<dyn ProductRepository>,
        usage: Arc<dyn MessageUsageRepository>,
        assistant: AssistantClient,
        order_writer: OrderWriter,
        gateway: Arc<dyn MessagingGateway>,
        notifier: OrderNotifier,
    ) -> Self {
        Self {
            merchants,
            customers,
            sessions,
            products,
            usage,
            assistant,
            order_writer,
            gateway,
            notifier,
            locks: SessionLocks::default(),
            confirmation_delay: CONFIRMATION_DELAY,
        }
    }

    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    /// The conversation-to-action loop for one inbound customer message.
    /// Customer-visible failure paths collapse onto three canned texts;
    /// repository failures propagate to the caller.
    pub async fn handle_inbound(&self, message: InboundMessage) -> Result<()> {
        let Some(merchant) =
            self.merchants.find_active_by_phone_number_id(&message.phone_number_id).await?
        else {
            warn!(
                event_name = "pipeline.merchant_unknown",
                phone_number_id = %message.phone_number_id.0,
                "no active merchant for inbound endpoint; dropping message"
            );
            return Ok(());
        };

        info!(
            event_name = "pipeline.message_received",
            correlation_id = %message.message_id,
            merchant_id = %merchant.id.0,
            customer = %message.from,
            message_type = %message.message_type,
            "inbound message accepted"
        );

        let _session_guard = self.locks.acquire(&merchant.id, &message.from).await;

        let now = Utc::now();
        if !merchant.is_subscription_active(now) {
            info!(
                event_name = "pipeline.subscription_inactive",
                correlation_id = %message.message_id,
                merchant_id = %merchant.id.0,
                "merchant subscription inactive; sending service notice"
            );
            return self.send(&merchant, &message.from, replies::SERVICE_UNAVAILABLE).await;
        }

        let plan = merchant.plan.config();
        let month = month_key(now);
        let used = self.usage.assistant_messages_for_month(&merchant.id, &month).await?;
        if plan.is_message_quota_exceeded(used) {
            warn!(
                event_name = "pipeline.quota_exceeded",
                correlation_id = %message.message_id,
                merchant_id = %merchant.id.0,
                plan = merchant.plan.as_str(),
                used,
                "monthly message quota reached; sending quota notice"
            );
            return self.send(&merchant, &message.from, replies::QUOTA_EXCEEDED).await;
        }

        let mut customer = match self
            .customers
            .find_by_whatsapp_number(&merchant.id, &message.from)
            .await?
        {
            Some(customer) => customer,
            None => Customer::new(merchant.id.clone(), message.from.clone()),
        };
        customer.last_interaction = now;
        self.customers.save(customer.clone()).await?;

        let mut session = match self.sessions.find_active(&merchant.id, &customer.id).await? {
            Some(session) => session,
            None => ConversationSession::new(merchant.id.clone(), customer.id.clone()),
        };

        if let Err(gateway_error) = self
            .gateway
            .mark_read(&merchant.phone_number_id, &merchant.whatsapp_token, &message.message_id)
            .await
        {
            warn!(
                event_name = "pipeline.mark_read_failed",
                correlation_id = %message.message_id,
                error = %gateway_error,
                "could not mark message as read"
            );
        }

        session.push_message(MessageRole::User, message.content.clone());
        self.sessions.save(session.clone()).await?;

        let products = self.products.list_available(&merchant.id).await?;
        let raw_reply = match self
            .assistant
            .generate_reply(&merchant, &customer, &products, &session)
            .await
        {
            Ok(raw_reply) => raw_reply,
            Err(llm_error) => {
                error!(
                    event_name = "pipeline.assistant_failed",
                    correlation_id = %message.message_id,
                    merchant_id = %merchant.id.0,
                    error = %llm_error,
                    "assistant generation failed; sending technical fallback"
                );
                return self.send(&merchant, &message.from, replies::TECHNICAL_FALLBACK).await;
            }
        };

        let extracted = actions::extract(&raw_reply);

        let mut order_summary = None;
        for action in &extracted.actions {
            match action {
                AssistantAction::UpdateName { name } => {
                    if customer.learn_name(name) {
                        self.customers.save(customer.clone()).await?;
                    }
                }
                AssistantAction::CreateOrder(directive) => {
                    let cart: BTreeMap<ProductId, u32> = if directive.items.is_empty() {
                        session.cart.clone()
                    } else {
                        directive
                            .items
                            .iter()
                            .map(|(id, quantity)| (ProductId(id.clone()), *quantity))
                            .collect()
                    };
                    let created = self
                        .order_writer
                        .create_order_from_cart(
                            &merchant,
                            &mut customer,
                            &cart,
                            &directive.address,
                            &directive.payment,
                        )
                        .await?;
                    if let Some(order) = created {
                        session.clear_cart_after_order();
                        self.sessions.save(session.clone()).await?;
                        order_summary = Some(order.to_whatsapp(&merchant.currency));
                        self.notifier.notify_new_order(&merchant, &order).await;
                    }
                }
            }
        }

        if !extracted.display_text.is_empty() {
            self.send(&merchant, &message.from, &extracted.display_text).await?;
            session.push_message(MessageRole::Assistant, extracted.display_text.clone());
            self.sessions.save(session.clone()).await?;
            self.usage.record_assistant_message(&merchant.id, &month).await?;
        }

        if let Some(summary) = order_summary {
            tokio::time::sleep(self.confirmation_delay).await;
            self.send(&merchant, &message.from, &summary).await?;
        }

        Ok(())
    }

    async fn send(&self, merchant: &Merchant, to: &str, text: &str) -> Result<()> {
        self.gateway
            .send_text(&merchant.phone_number_id, &merchant.whatsapp_token, to, text)
            .await
            .context("outbound message delivery failed")
    }
}

fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use boutiq_core::domain::merchant::MerchantId;

    use super::{month_key, SessionLocks};

    #[test]
    fn month_key_is_year_dash_month() {
        let instant = chrono::Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();
        assert_eq!(month_key(instant), "2025-03");
    }

    #[tokio::test]
    async fn idle_session_locks_are_evicted() {
        let locks = SessionLocks::default();
        let merchant_id = MerchantId("m-1".to_string());

        let guard = locks.acquire(&merchant_id, "22891112222").await;
        drop(guard);
        assert_eq!(locks.tracked_pairs().await, 1);

        let _guard = locks.acquire(&merchant_id, "22893334444").await;
        assert_eq!(locks.tracked_pairs().await, 1);
    }

    #[tokio::test]
    async fn held_session_locks_survive_eviction() {
        let locks = SessionLocks::default();
        let merchant_id = MerchantId("m-1".to_string());

        let _held = locks.acquire(&merchant_id, "22891112222").await;
        let _other = locks.acquire(&merchant_id, "22893334444").await;
        assert_eq!(locks.tracked_pairs().await, 2);
    }
}
