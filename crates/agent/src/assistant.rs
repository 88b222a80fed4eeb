use std::sync::Arc;

use anyhow::Result;

use boutiq_core::catalog;
use boutiq_core::domain::customer::Customer;
use boutiq_core::domain::merchant::Merchant;
use boutiq_core::domain::product::Product;
use boutiq_core::domain::session::ConversationSession;

use crate::llm::LlmClient;
use crate::prompt;

/// Produces the raw assistant reply for one user turn. Returns the
/// model text unparsed; directive extraction happens downstream.
pub struct AssistantClient {
    llm: Arc<dyn LlmClient>,
}

impl AssistantClient {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Expects the current user turn to already be recorded in the
    /// session; the whole session log becomes the model conversation.
    pub async fn generate_reply(
        &self,
        merchant: &Merchant,
        customer: &Customer,
        products: &[Product],
        session: &ConversationSession,
    ) -> Result<String> {
        let catalog_text = catalog::render_for_assistant(products, &merchant.currency);
        let system = prompt::build_system_prompt(merchant, &catalog_text, customer);

        let cart_summary = if session.cart.is_empty() {
            None
        } else {
            Some(catalog::cart_summary(&session.cart, products))
        };
        let turns = prompt::assemble_history(session, cart_summary.as_deref());

        self.llm.complete(&system, &turns).await
    }
}
