use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::merchant::MerchantId;
use crate::domain::product::ProductId;

/// The message log keeps only the most recent turns; older entries are
/// evicted oldest-first.
pub const MESSAGE_LOG_CAP: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Greeting,
    PostOrder,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::PostOrder => "post_order",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "greeting" => Some(Self::Greeting),
            "post_order" => Some(Self::PostOrder),
            _ => None,
        }
    }
}

/// Conversation state for one customer talking to one merchant's
/// assistant. At most one active session exists per pair; sessions are
/// deactivated rather than deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: SessionId,
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub messages: Vec<SessionMessage>,
    pub cart: BTreeMap<ProductId, u32>,
    pub state: SessionState,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(merchant_id: MerchantId, customer_id: CustomerId) -> Self {
        Self {
            id: SessionId(uuid::Uuid::new_v4().to_string()),
            merchant_id,
            customer_id,
            messages: Vec::new(),
            cart: BTreeMap::new(),
            state: SessionState::Greeting,
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn push_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(SessionMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        if self.messages.len() > MESSAGE_LOG_CAP {
            let excess = self.messages.len() - MESSAGE_LOG_CAP;
            self.messages.drain(..excess);
        }
        self.updated_at = Utc::now();
    }

    /// Applied once an order was persisted: the pending cart is spent and
    /// the conversation moves past the ordering phase.
    pub fn clear_cart_after_order(&mut self) {
        self.cart.clear();
        self.state = SessionState::PostOrder;
        self.updated_at = Utc::now();
    }
}
