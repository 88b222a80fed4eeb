//! WhatsApp Cloud API boundary: outbound gateway, inbound payload
//! normalization, and webhook signature verification.

pub mod client;
pub mod gateway;
pub mod notify;
pub mod signature;
pub mod webhook;

pub use client::CloudApiClient;
pub use gateway::{GatewayError, MessagingGateway, NoopGateway};
pub use notify::OrderNotifier;
pub use webhook::{parse_inbound, InboundMessage};
