use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use boutiq_core::domain::merchant::PhoneNumberId;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("cloud api rejected the request: status {status}, body {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound side of the Cloud API. Each call carries the sending
/// merchant's endpoint id and access token; the gateway itself holds no
/// tenant state.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Delivers `text` to `to`, splitting oversized messages into
    /// sequential parts under the platform limit.
    async fn send_text(
        &self,
        endpoint: &PhoneNumberId,
        credential: &SecretString,
        to: &str,
        text: &str,
    ) -> Result<(), GatewayError>;

    /// Marks an inbound message as read. Best-effort from the caller's
    /// point of view.
    async fn mark_read(
        &self,
        endpoint: &PhoneNumberId,
        credential: &SecretString,
        message_id: &str,
    ) -> Result<(), GatewayError>;
}

#[derive(Default)]
pub struct NoopGateway;

#[async_trait]
impl MessagingGateway for NoopGateway {
    async fn send_text(
        &self,
        _endpoint: &PhoneNumberId,
        _credential: &SecretString,
        _to: &str,
        _text: &str,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn mark_read(
        &self,
        _endpoint: &PhoneNumberId,
        _credential: &SecretString,
        _message_id: &str,
    ) -> Result<(), GatewayError> {
        Ok(())
    }
}
