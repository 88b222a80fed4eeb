//! Assistant runtime - the conversation-to-action loop
//!
//! This crate turns one inbound WhatsApp message into replies and,
//! possibly, a persisted order:
//! - Builds the per-merchant system prompt and conversation history
//! - Calls the model through a pluggable `LlmClient`
//! - Extracts `ACTION:` directives from the raw reply
//! - Applies them (customer name, order creation with stock clamping)
//!
//! # Safety Principle
//!
//! The model is strictly a salesperson's mouth, never its hands. It
//! proposes orders as text directives; stock movement, pricing, and
//! persistence are deterministic decisions made here and in the
//! repositories.

pub mod assistant;
pub mod llm;
pub mod orders;
pub mod pipeline;
pub mod prompt;

pub use assistant::AssistantClient;
pub use llm::{AnthropicClient, ChatTurn, LlmClient};
pub use orders::OrderWriter;
pub use pipeline::MessagePipeline;
