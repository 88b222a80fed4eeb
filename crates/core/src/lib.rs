pub mod actions;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod plans;
pub mod replies;

pub use actions::{extract, AssistantAction, ExtractedReply, OrderDirective};
pub use domain::customer::{Customer, CustomerId};
pub use domain::merchant::{Merchant, MerchantId, PhoneNumberId};
pub use domain::order::{Order, OrderId, OrderLine, OrderStatus, PaymentStatus};
pub use domain::product::{Product, ProductId};
pub use domain::session::{
    ConversationSession, MessageRole, SessionId, SessionMessage, SessionState, MESSAGE_LOG_CAP,
};
pub use errors::{ApplicationError, DomainError};
pub use plans::{PlanConfig, PlanTier};

pub use chrono;
pub use rust_decimal;
