use serde_json::Value;

use boutiq_core::domain::merchant::PhoneNumberId;

pub const IMAGE_PLACEHOLDER: &str = "[Image envoyée]";
pub const AUDIO_PLACEHOLDER: &str = "[Message vocal non supporté]";

/// One normalized inbound customer message.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundMessage {
    pub message_id: String,
    pub from: String,
    pub phone_number_id: PhoneNumberId,
    pub content: String,
    pub message_type: String,
}

/// Walks a webhook notification and normalizes every processable
/// message. Unsupported types, empty content, and status-only change
/// events are dropped, never errored: the platform retries on non-200
/// and a poison payload must not wedge the queue.
pub fn parse_inbound(payload: &Value) -> Vec<InboundMessage> {
    let mut inbound = Vec::new();

    let entries = payload.get("entry").and_then(Value::as_array).cloned().unwrap_or_default();
    for entry in &entries {
        let changes = entry.get("changes").and_then(Value::as_array).cloned().unwrap_or_default();
        for change in &changes {
            let Some(value) = change.get("value") else { continue };
            let Some(phone_number_id) = value
                .get("metadata")
                .and_then(|metadata| metadata.get("phone_number_id"))
                .and_then(Value::as_str)
            else {
                continue;
            };

            let messages =
                value.get("messages").and_then(Value::as_array).cloned().unwrap_or_default();
            for message in &messages {
                if let Some(normalized) = normalize_message(phone_number_id, message) {
                    inbound.push(normalized);
                }
            }
        }
    }

    inbound
}

fn normalize_message(phone_number_id: &str, message: &Value) -> Option<InboundMessage> {
    let message_id = message.get("id").and_then(Value::as_str)?.to_string();
    let from = message.get("from").and_then(Value::as_str)?.to_string();
    let message_type = message.get("type").and_then(Value::as_str)?;

    let content = match message_type {
        "text" => message
            .get("text")
            .and_then(|text| text.get("body"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string(),
        "interactive" => message
            .get("interactive")
            .and_then(|interactive| {
                interactive
                    .get("button_reply")
                    .and_then(|reply| reply.get("title"))
                    .and_then(Value::as_str)
                    .or_else(|| {
                        interactive
                            .get("list_reply")
                            .and_then(|reply| reply.get("title"))
                            .and_then(Value::as_str)
                    })
            })
            .unwrap_or("")
            .trim()
            .to_string(),
        "image" => IMAGE_PLACEHOLDER.to_string(),
        "audio" => AUDIO_PLACEHOLDER.to_string(),
        _ => return None,
    };

    if content.is_empty() {
        return None;
    }

    Some(InboundMessage {
        message_id,
        from,
        phone_number_id: PhoneNumberId(phone_number_id.to_string()),
        content,
        message_type: message_type.to_string(),
    })
}
