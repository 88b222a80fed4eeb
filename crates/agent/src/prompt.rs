//! Deterministic prompt assembly. Same merchant, customer, and catalog
//! in, same prompt out; the model never sees raw records.

use boutiq_core::domain::customer::Customer;
use boutiq_core::domain::merchant::Merchant;
use boutiq_core::domain::session::ConversationSession;

use crate::llm::ChatTurn;

pub fn build_system_prompt(merchant: &Merchant, catalog_text: &str, customer: &Customer) -> String {
    let mut customer_info = String::new();
    if let Some(name) = &customer.name {
        customer_info.push_str(&format!("Le client s'appelle {name}. "));
    }
    if customer.total_orders > 0 {
        customer_info.push_str(&format!(
            "C'est un client fidèle avec {} commande(s).",
            customer.total_orders
        ));
    }

    format!(
        "Tu es l'assistante virtuelle de la boutique *{name}* à {city}, {country}.\n\n\
         {description}\n\n\
         {persona}\n\n\
         {customer_info}\n\n\
         ---\nCATALOGUE ACTUEL :\n{catalog_text}\n---\n\n\
         RÈGLES :\n\
         1. Réponds TOUJOURS en français, ton chaleureux et professionnel.\n\
         2. Prix en {currency}.\n\
         3. Pour commander, collecte : produits + quantités + adresse de livraison.\n\
         4. Quand la commande est prête, ajoute EXACTEMENT cette ligne à la fin :\n   \
         ACTION:CREATE_ORDER:{{\"items\":{{\"productId\":quantity}},\"address\":\"adresse\",\"payment\":\"mobile_money\"}}\n\
         5. Si tu détectes le prénom du client, ajoute : ACTION:UPDATE_NAME:Prénom\n\
         6. Ne réponds jamais à des sujets hors commerce.\n\
         7. Sois concise — messages courts et lisibles.",
        name = merchant.name,
        city = merchant.city,
        country = merchant.country,
        description = merchant.business_description,
        persona = merchant.ai_persona,
        currency = merchant.currency,
    )
}

/// Session turns as model turns. The caller records the inbound user
/// message in the session before asking for a reply, so the last turn
/// is the current one; when the cart is non-empty its summary rides
/// along inside that turn so the model sees it without a separate role.
pub fn assemble_history(
    session: &ConversationSession,
    cart_summary: Option<&str>,
) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = session
        .messages
        .iter()
        .map(|message| ChatTurn { role: message.role, content: message.content.clone() })
        .collect();

    if let Some(summary) = cart_summary {
        if let Some(last) = turns.last_mut() {
            last.content.push_str(&format!("\n\n[Panier actuel : {summary}]"));
        }
    }
    turns
}
