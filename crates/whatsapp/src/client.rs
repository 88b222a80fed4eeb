use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use boutiq_core::domain::merchant::PhoneNumberId;

use crate::gateway::{GatewayError, MessagingGateway};

/// Cloud API message body limit. Longer texts are delivered as
/// sequential parts.
pub const MAX_MESSAGE_CHARS: usize = 4_000;

pub struct CloudApiClient {
    http: reqwest::Client,
    api_base: String,
    timeout: Duration,
}

impl CloudApiClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            timeout: Duration::from_secs(30),
        }
    }

    async fn post_message(
        &self,
        endpoint: &PhoneNumberId,
        credential: &SecretString,
        payload: serde_json::Value,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/{}/messages", self.api_base.trim_end_matches('/'), endpoint.0);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(credential.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for CloudApiClient {
    async fn send_text(
        &self,
        endpoint: &PhoneNumberId,
        credential: &SecretString,
        to: &str,
        text: &str,
    ) -> Result<(), GatewayError> {
        let parts = split_message(text);
        let part_count = parts.len();
        for (index, part) in parts.into_iter().enumerate() {
            debug!(
                event_name = "egress.whatsapp.text_part",
                endpoint = %endpoint.0,
                part = index + 1,
                part_count,
                "sending text message part"
            );
            self.post_message(
                endpoint,
                credential,
                json!({
                    "messaging_product": "whatsapp",
                    "to": to,
                    "type": "text",
                    "text": { "preview_url": false, "body": part },
                }),
            )
            .await?;
        }
        Ok(())
    }

    async fn mark_read(
        &self,
        endpoint: &PhoneNumberId,
        credential: &SecretString,
        message_id: &str,
    ) -> Result<(), GatewayError> {
        self.post_message(
            endpoint,
            credential,
            json!({
                "messaging_product": "whatsapp",
                "status": "read",
                "message_id": message_id,
            }),
        )
        .await
    }
}

/// Fixed-size chunks on character boundaries. Empty input still yields
/// one (empty) part so a send call is never silently skipped.
pub fn split_message(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == MAX_MESSAGE_CHARS {
            parts.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::{split_message, MAX_MESSAGE_CHARS};

    #[test]
    fn short_message_is_a_single_part() {
        assert_eq!(split_message("Bonjour"), vec!["Bonjour".to_string()]);
    }

    #[test]
    fn message_at_the_limit_is_not_split() {
        let text = "a".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(split_message(&text).len(), 1);
    }

    #[test]
    fn oversized_message_splits_into_sequential_parts() {
        let text = "a".repeat(MAX_MESSAGE_CHARS * 2 + 10);
        let parts = split_message(&text);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(parts[1].chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(parts[2].chars().count(), 10);
    }

    #[test]
    fn splitting_counts_characters_not_bytes() {
        let text = "é".repeat(MAX_MESSAGE_CHARS + 1);
        let parts = split_message(&text);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(parts[1], "é");
    }
}
