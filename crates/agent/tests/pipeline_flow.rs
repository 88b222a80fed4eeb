//! End-to-end pipeline runs against in-memory repositories, a scripted
//! model, and a recording gateway.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::Mutex;

use boutiq_agent::{AssistantClient, ChatTurn, LlmClient, MessagePipeline, OrderWriter};
use boutiq_core::config::NotificationsConfig;
use boutiq_core::domain::merchant::{Merchant, MerchantId, PhoneNumberId};
use boutiq_core::domain::order::OrderStatus;
use boutiq_core::domain::product::{Product, ProductId};
use boutiq_core::domain::session::SessionState;
use boutiq_core::plans::PlanTier;
use boutiq_core::replies;
use boutiq_db::repositories::{
    CustomerRepository, InMemoryCustomerRepository, InMemoryMerchantRepository,
    InMemoryMessageUsageRepository, InMemoryOrderRepository, InMemoryProductRepository,
    InMemorySessionRepository, MerchantRepository, MessageUsageRepository, OrderRepository,
    ProductRepository, SessionRepository,
};
use boutiq_whatsapp::gateway::{GatewayError, MessagingGateway};
use boutiq_whatsapp::notify::OrderNotifier;
use boutiq_whatsapp::webhook::InboundMessage;

struct ScriptedModel {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
}

impl ScriptedModel {
    fn with_script(replies: Vec<anyhow::Result<String>>) -> Self {
        Self { replies: Mutex::new(replies.into()) }
    }
}

#[async_trait]
impl LlmClient for ScriptedModel {
    async fn complete(&self, _system: &str, _turns: &[ChatTurn]) -> anyhow::Result<String> {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("script exhausted")))
    }
}

#[derive(Default)]
struct RecordingGateway {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    sent: Vec<(String, String)>,
    read_receipts: Vec<String>,
}

impl RecordingGateway {
    async fn sent(&self) -> Vec<(String, String)> {
        self.state.lock().await.sent.clone()
    }

    async fn read_receipts(&self) -> Vec<String> {
        self.state.lock().await.read_receipts.clone()
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_text(
        &self,
        _endpoint: &PhoneNumberId,
        _credential: &SecretString,
        to: &str,
        text: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        state.sent.push((to.to_string(), text.to_string()));
        Ok(())
    }

    async fn mark_read(
        &self,
        _endpoint: &PhoneNumberId,
        _credential: &SecretString,
        message_id: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        state.read_receipts.push(message_id.to_string());
        Ok(())
    }
}

struct Harness {
    merchants: Arc<InMemoryMerchantRepository>,
    customers: Arc<InMemoryCustomerRepository>,
    sessions: Arc<InMemorySessionRepository>,
    products: Arc<InMemoryProductRepository>,
    usage: Arc<InMemoryMessageUsageRepository>,
    orders: Arc<InMemoryOrderRepository>,
    gateway: Arc<RecordingGateway>,
    pipeline: MessagePipeline,
}

fn harness(replies: Vec<anyhow::Result<String>>) -> Harness {
    let merchants = Arc::new(InMemoryMerchantRepository::default());
    let customers = Arc::new(InMemoryCustomerRepository::default());
    let sessions = Arc::new(InMemorySessionRepository::default());
    let products = Arc::new(InMemoryProductRepository::default());
    let usage = Arc::new(InMemoryMessageUsageRepository::default());
    let orders = Arc::new(InMemoryOrderRepository::default());
    let gateway = Arc::new(RecordingGateway::default());

    let assistant = AssistantClient::new(Arc::new(ScriptedModel::with_script(replies)));
    let order_writer =
        OrderWriter::new(products.clone(), orders.clone(), customers.clone());
    let notifier = OrderNotifier::new(
        gateway.clone(),
        &NotificationsConfig { enabled: false, phone_number_id: None, token: None },
    );

    let pipeline = MessagePipeline::new(
        merchants.clone(),
        customers.clone(),
        sessions.clone(),
        products.clone(),
        usage.clone(),
        assistant,
        order_writer,
        gateway.clone(),
        notifier,
    )
    .with_confirmation_delay(Duration::ZERO);

    Harness { merchants, customers, sessions, products, usage, orders, gateway, pipeline }
}

fn merchant() -> Merchant {
    Merchant {
        id: MerchantId("m-1".to_string()),
        name: "Chez Awa".to_string(),
        owner_phone: "22507000001".to_string(),
        phone_number_id: PhoneNumberId("pn-1".to_string()),
        whatsapp_token: SecretString::from("token-m-1"),
        business_description: "Boutique de pagnes".to_string(),
        ai_persona: "chaleureuse et professionnelle".to_string(),
        city: "Abidjan".to_string(),
        country: "Côte d'Ivoire".to_string(),
        currency: "FCFA".to_string(),
        is_active: true,
        plan: PlanTier::Starter,
        subscription_expires_at: Some(Utc::now() + ChronoDuration::days(30)),
        created_at: Utc::now(),
    }
}

fn product(id: &str, name: &str, price: u32, stock: u32) -> Product {
    Product {
        id: ProductId(id.to_string()),
        merchant_id: MerchantId("m-1".to_string()),
        name: name.to_string(),
        description: String::new(),
        price: Decimal::from(price),
        stock,
        category: "Textile".to_string(),
        is_available: stock > 0,
    }
}

fn inbound(text: &str) -> InboundMessage {
    InboundMessage {
        message_id: "wamid.1".to_string(),
        from: "22501020304".to_string(),
        phone_number_id: PhoneNumberId("pn-1".to_string()),
        content: text.to_string(),
        message_type: "text".to_string(),
    }
}

#[tokio::test]
async fn order_directive_creates_order_clamps_stock_and_clears_cart() {
    let reply = "C'est noté, je vous prépare ça !\n\
                 ACTION:CREATE_ORDER:{\"items\":{\"p-1\":2},\"address\":\"Cocody\",\"payment\":\"cash\"}";
    let h = harness(vec![Ok(reply.to_string())]);
    h.merchants.save(merchant()).await.unwrap();
    h.products.save(product("p-1", "Pagne wax", 1_000, 3)).await.unwrap();

    h.pipeline.handle_inbound(inbound("Je prends 2 pagnes")).await.unwrap();

    let sent = h.gateway.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], ("22501020304".to_string(), "C'est noté, je vous prépare ça !".to_string()));
    assert!(sent[1].1.contains("COMMANDE CONFIRMÉE"));
    assert!(sent[1].1.contains("2 000 FCFA"));
    assert!(!sent[1].1.contains("ACTION:"));

    let remaining = h
        .products
        .find_by_id(&MerchantId("m-1".to_string()), &ProductId("p-1".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remaining.stock, 1);

    let orders =
        h.orders.list_for_merchant(&MerchantId("m-1".to_string()), None).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert_eq!(orders[0].total_amount, Decimal::from(2_000));
    assert_eq!(orders[0].delivery_address, "Cocody");

    let customer = h
        .customers
        .find_by_whatsapp_number(&MerchantId("m-1".to_string()), "22501020304")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.total_orders, 1);
    assert_eq!(customer.total_spent, Decimal::from(2_000));

    let session = h
        .sessions
        .find_active(&MerchantId("m-1".to_string()), &customer.id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.cart.is_empty());
    assert_eq!(session.state, SessionState::PostOrder);
    // user turn plus the assistant's visible text, directive stripped
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].content, "C'est noté, je vous prépare ça !");

    assert_eq!(h.gateway.read_receipts().await, vec!["wamid.1".to_string()]);
    assert_eq!(
        h.usage
            .assistant_messages_for_month(&MerchantId("m-1".to_string()), &month_key())
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn expired_subscription_gets_service_notice_and_no_state() {
    let h = harness(vec![Ok("jamais atteint".to_string())]);
    let mut expired = merchant();
    expired.subscription_expires_at = Some(Utc::now() - ChronoDuration::days(1));
    h.merchants.save(expired).await.unwrap();

    h.pipeline.handle_inbound(inbound("Bonjour")).await.unwrap();

    let sent = h.gateway.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, replies::SERVICE_UNAVAILABLE);

    let customer = h
        .customers
        .find_by_whatsapp_number(&MerchantId("m-1".to_string()), "22501020304")
        .await
        .unwrap();
    assert!(customer.is_none());
}

#[tokio::test]
async fn exhausted_quota_gets_notice_and_creates_no_session() {
    let h = harness(vec![Ok("jamais atteint".to_string())]);
    h.merchants.save(merchant()).await.unwrap();

    let merchant_id = MerchantId("m-1".to_string());
    let month = month_key();
    for _ in 0..500 {
        h.usage.record_assistant_message(&merchant_id, &month).await.unwrap();
    }

    h.pipeline.handle_inbound(inbound("Bonjour")).await.unwrap();

    let sent = h.gateway.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, replies::QUOTA_EXCEEDED);
    assert!(h.gateway.read_receipts().await.is_empty());
    assert_eq!(
        h.usage.assistant_messages_for_month(&merchant_id, &month).await.unwrap(),
        500
    );
}

#[tokio::test]
async fn model_failure_falls_back_to_technical_notice() {
    let h = harness(vec![Err(anyhow!("upstream 529"))]);
    h.merchants.save(merchant()).await.unwrap();

    h.pipeline.handle_inbound(inbound("Bonjour")).await.unwrap();

    let sent = h.gateway.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, replies::TECHNICAL_FALLBACK);

    // the inbound turn is persisted, the fallback is not
    let customer = h
        .customers
        .find_by_whatsapp_number(&MerchantId("m-1".to_string()), "22501020304")
        .await
        .unwrap()
        .unwrap();
    let session = h
        .sessions
        .find_active(&MerchantId("m-1".to_string()), &customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.messages.len(), 1);
    assert_eq!(
        h.usage
            .assistant_messages_for_month(&MerchantId("m-1".to_string()), &month_key())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn update_name_directive_persists_the_customer_name() {
    let reply = "Enchanté Aminata !\nACTION:UPDATE_NAME:Aminata";
    let h = harness(vec![Ok(reply.to_string())]);
    h.merchants.save(merchant()).await.unwrap();

    h.pipeline.handle_inbound(inbound("Je m'appelle Aminata")).await.unwrap();

    let customer = h
        .customers
        .find_by_whatsapp_number(&MerchantId("m-1".to_string()), "22501020304")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.name.as_deref(), Some("Aminata"));

    let sent = h.gateway.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "Enchanté Aminata !");
}

#[tokio::test]
async fn unknown_endpoint_is_dropped_silently() {
    let h = harness(vec![Ok("jamais atteint".to_string())]);
    // no merchant registered for pn-1

    h.pipeline.handle_inbound(inbound("Bonjour")).await.unwrap();

    assert!(h.gateway.sent().await.is_empty());
}

#[tokio::test]
async fn concurrent_messages_from_one_customer_are_serialized() {
    let h = harness(vec![
        Ok("Bienvenue !".to_string()),
        Ok("Avec plaisir !".to_string()),
    ]);
    h.merchants.save(merchant()).await.unwrap();

    let mut second = inbound("Et vos prix ?");
    second.message_id = "wamid.2".to_string();
    let (first_run, second_run) =
        tokio::join!(h.pipeline.handle_inbound(inbound("Bonjour")), h.pipeline.handle_inbound(second));
    first_run.unwrap();
    second_run.unwrap();

    // one session, both exchanges recorded, no lost update
    let customer = h
        .customers
        .find_by_whatsapp_number(&MerchantId("m-1".to_string()), "22501020304")
        .await
        .unwrap()
        .unwrap();
    let session = h
        .sessions
        .find_active(&MerchantId("m-1".to_string()), &customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.messages.len(), 4);
    assert_eq!(h.gateway.sent().await.len(), 2);
    assert_eq!(
        h.usage
            .assistant_messages_for_month(&MerchantId("m-1".to_string()), &month_key())
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn sold_out_directive_sends_no_confirmation_and_keeps_cart() {
    let reply = "Je lance la commande !\n\
                 ACTION:CREATE_ORDER:{\"items\":{\"p-1\":1},\"address\":\"\",\"payment\":\"\"}";
    let h = harness(vec![Ok(reply.to_string())]);
    h.merchants.save(merchant()).await.unwrap();
    h.products.save(product("p-1", "Pagne wax", 1_000, 0)).await.unwrap();

    h.pipeline.handle_inbound(inbound("Je prends le pagne")).await.unwrap();

    let sent = h.gateway.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "Je lance la commande !");

    let orders =
        h.orders.list_for_merchant(&MerchantId("m-1".to_string()), None).await.unwrap();
    assert!(orders.is_empty());
}

fn month_key() -> String {
    Utc::now().format("%Y-%m").to_string()
}
