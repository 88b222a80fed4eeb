use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{error, info, warn};

use boutiq_agent::MessagePipeline;
use boutiq_core::config::WhatsAppConfig;
use boutiq_whatsapp::signature;
use boutiq_whatsapp::webhook::parse_inbound;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Clone)]
pub struct WebhookState {
    pipeline: Arc<MessagePipeline>,
    verify_token: String,
    app_secret: Option<String>,
}

impl WebhookState {
    pub fn new(pipeline: Arc<MessagePipeline>, whatsapp: &WhatsAppConfig) -> Self {
        Self {
            pipeline,
            verify_token: whatsapp.verify_token.clone(),
            app_secret: whatsapp
                .app_secret
                .as_ref()
                .map(|secret| secret.expose_secret().to_string()),
        }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_subscription).post(receive))
        .with_state(state)
}

/// Meta's one-time subscription handshake: echo the challenge when the
/// verify token matches, 403 otherwise.
async fn verify_subscription(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == Some("subscribe") && token == Some(state.verify_token.as_str()) {
        info!(event_name = "ingress.webhook.verified", "webhook subscription verified");
        return (StatusCode::OK, challenge);
    }

    warn!(event_name = "ingress.webhook.verify_rejected", "webhook verification rejected");
    (StatusCode::FORBIDDEN, String::new())
}

/// The platform expects a fast 200; processing happens on spawned tasks
/// after the response is decided.
async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature_header =
        headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());

    if state.app_secret.is_none() {
        warn!(
            event_name = "ingress.webhook.signature_bypassed",
            "no app secret configured; accepting unsigned webhook payload"
        );
    }
    if !signature::verify(state.app_secret.as_deref(), signature_header, &body) {
        warn!(event_name = "ingress.webhook.signature_invalid", "webhook signature mismatch");
        return StatusCode::FORBIDDEN;
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(parse_error) => {
            warn!(
                event_name = "ingress.webhook.malformed_payload",
                error = %parse_error,
                "webhook body is not valid json"
            );
            return StatusCode::OK;
        }
    };

    for message in parse_inbound(&payload) {
        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            let correlation_id = message.message_id.clone();
            if let Err(pipeline_error) = pipeline.handle_inbound(message).await {
                error!(
                    event_name = "ingress.webhook.handling_failed",
                    correlation_id = %correlation_id,
                    error = %pipeline_error,
                    "inbound message handling failed"
                );
            }
        });
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use boutiq_agent::{AssistantClient, MessagePipeline, OrderWriter};
    use boutiq_core::config::WhatsAppConfig;
    use boutiq_db::repositories::{
        InMemoryCustomerRepository, InMemoryMerchantRepository, InMemoryMessageUsageRepository,
        InMemoryOrderRepository, InMemoryProductRepository, InMemorySessionRepository,
    };
    use boutiq_whatsapp::gateway::NoopGateway;
    use boutiq_whatsapp::notify::OrderNotifier;

    use super::{router, WebhookState};

    struct FailingModel;

    #[async_trait::async_trait]
    impl boutiq_agent::LlmClient for FailingModel {
        async fn complete(
            &self,
            _system: &str,
            _turns: &[boutiq_agent::ChatTurn],
        ) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("not under test"))
        }
    }

    fn test_router(app_secret: Option<&str>) -> axum::Router {
        let gateway = Arc::new(NoopGateway);
        let products = Arc::new(InMemoryProductRepository::default());
        let customers = Arc::new(InMemoryCustomerRepository::default());
        let pipeline = Arc::new(MessagePipeline::new(
            Arc::new(InMemoryMerchantRepository::default()),
            customers.clone(),
            Arc::new(InMemorySessionRepository::default()),
            products.clone(),
            Arc::new(InMemoryMessageUsageRepository::default()),
            AssistantClient::new(Arc::new(FailingModel)),
            OrderWriter::new(
                products,
                Arc::new(InMemoryOrderRepository::default()),
                customers,
            ),
            gateway.clone(),
            OrderNotifier::new(
                gateway,
                &boutiq_core::config::NotificationsConfig {
                    enabled: false,
                    phone_number_id: None,
                    token: None,
                },
            ),
        ));
        let whatsapp = WhatsAppConfig {
            api_base: "https://graph.facebook.com/v21.0".to_string(),
            verify_token: "expected-token".to_string(),
            app_secret: app_secret.map(|value| value.to_string().into()),
        };
        router(WebhookState::new(pipeline, &whatsapp))
    }

    #[tokio::test]
    async fn handshake_echoes_challenge_for_the_right_token() {
        let app = test_router(None);
        let response = app
            .oneshot(
                Request::get(
                    "/webhook?hub.mode=subscribe&hub.verify_token=expected-token&hub.challenge=12345",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"12345");
    }

    #[tokio::test]
    async fn handshake_rejects_a_wrong_token() {
        let app = test_router(None);
        let response = app
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unsigned_post_is_rejected_when_a_secret_is_configured() {
        let app = test_router(Some("topsecret"));
        let response = app
            .oneshot(Request::post("/webhook").body(Body::from("{}")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn post_without_a_configured_secret_is_accepted() {
        let app = test_router(None);
        let response = app
            .oneshot(Request::post("/webhook").body(Body::from("{}")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_json_still_returns_ok() {
        let app = test_router(None);
        let response = app
            .oneshot(Request::post("/webhook").body(Body::from("not json")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
