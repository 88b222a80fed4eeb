//! Directive extraction from raw assistant text.
//!
//! The model is asked, purely via the prompt, to append lines of the
//! form `ACTION:CREATE_ORDER:<json>` or `ACTION:UPDATE_NAME:<name>` to
//! its reply. This module recovers those directives and strips them from
//! the customer-visible text. It is the seam between an unreliable text
//! generator and the typed domain: a malformed directive must look
//! identical to the model having emitted none at all, and directive
//! syntax must never leak to the customer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const CREATE_ORDER_PREFIX: &str = "ACTION:CREATE_ORDER:";
const UPDATE_NAME_PREFIX: &str = "ACTION:UPDATE_NAME:";

/// Payload of a `CREATE_ORDER` directive. `items` maps product ids to
/// requested quantities; an empty map defers to the session's cart.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDirective {
    #[serde(default)]
    pub items: BTreeMap<String, u32>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub payment: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssistantAction {
    CreateOrder(OrderDirective),
    UpdateName { name: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedReply {
    pub display_text: String,
    pub actions: Vec<AssistantAction>,
}

/// Line-by-line lenient scan. Directive lines are removed from the
/// display text; a `CREATE_ORDER` line whose JSON does not parse is
/// dropped entirely. Everything else is preserved verbatim and in order.
pub fn extract(raw: &str) -> ExtractedReply {
    let mut display_lines = Vec::new();
    let mut actions = Vec::new();

    for line in raw.trim().lines() {
        if let Some(payload) = line.strip_prefix(CREATE_ORDER_PREFIX) {
            if let Ok(directive) = serde_json::from_str::<OrderDirective>(payload) {
                actions.push(AssistantAction::CreateOrder(directive));
            }
        } else if let Some(candidate) = line.strip_prefix(UPDATE_NAME_PREFIX) {
            let name = candidate.trim();
            if !name.is_empty() {
                actions.push(AssistantAction::UpdateName { name: name.to_string() });
            }
        } else {
            display_lines.push(line);
        }
    }

    ExtractedReply {
        display_text: display_lines.join("\n").trim().to_string(),
        actions,
    }
}

#[cfg(test)]
mod tests {
    use super::{extract, AssistantAction, OrderDirective};

    #[test]
    fn plain_text_passes_through_untouched() {
        let reply = extract("Bonjour ! Que puis-je faire pour vous ?");
        assert_eq!(reply.display_text, "Bonjour ! Que puis-je faire pour vous ?");
        assert!(reply.actions.is_empty());
    }

    #[test]
    fn create_order_directive_is_stripped_and_parsed() {
        let reply = extract(
            "Parfait, je valide votre commande.\nACTION:CREATE_ORDER:{\"items\":{\"p-1\":2},\"address\":\"Rue 1\",\"payment\":\"mobile_money\"}",
        );

        assert_eq!(reply.display_text, "Parfait, je valide votre commande.");
        assert_eq!(reply.actions.len(), 1);
        let AssistantAction::CreateOrder(directive) = &reply.actions[0] else {
            panic!("expected a create-order action");
        };
        assert_eq!(directive.items.get("p-1"), Some(&2));
        assert_eq!(directive.address, "Rue 1");
        assert_eq!(directive.payment, "mobile_money");
    }

    #[test]
    fn malformed_create_order_json_is_silently_dropped() {
        let reply = extract("Bonjour!\nACTION:CREATE_ORDER:{not valid json}\n");
        assert_eq!(reply.display_text, "Bonjour!");
        assert!(reply.actions.is_empty());
    }

    #[test]
    fn update_name_directive_extracts_trailing_name() {
        let reply = extract("Merci\nACTION:UPDATE_NAME:Ama\n");
        assert_eq!(reply.display_text, "Merci");
        assert_eq!(
            reply.actions,
            vec![AssistantAction::UpdateName { name: "Ama".to_string() }]
        );
    }

    #[test]
    fn empty_update_name_is_dropped() {
        let reply = extract("Merci\nACTION:UPDATE_NAME:   \n");
        assert_eq!(reply.display_text, "Merci");
        assert!(reply.actions.is_empty());
    }

    #[test]
    fn multiple_directives_keep_encounter_order() {
        let reply = extract(
            "D'accord Ama !\nACTION:UPDATE_NAME:Ama\nACTION:CREATE_ORDER:{\"items\":{\"p-1\":1},\"address\":\"Kodjoviakopé\",\"payment\":\"cash\"}",
        );

        assert_eq!(reply.display_text, "D'accord Ama !");
        assert_eq!(reply.actions.len(), 2);
        assert!(matches!(reply.actions[0], AssistantAction::UpdateName { .. }));
        assert!(matches!(reply.actions[1], AssistantAction::CreateOrder(_)));
    }

    #[test]
    fn directive_with_missing_fields_defaults_them() {
        let reply = extract("Ok\nACTION:CREATE_ORDER:{\"items\":{\"p-9\":3}}");
        let AssistantAction::CreateOrder(directive) = &reply.actions[0] else {
            panic!("expected a create-order action");
        };
        assert_eq!(directive, &OrderDirective {
            items: [("p-9".to_string(), 3)].into_iter().collect(),
            address: String::new(),
            payment: String::new(),
        });
    }

    #[test]
    fn extraction_is_idempotent_on_clean_text() {
        let first = extract("Bonjour\nVoici le catalogue.\nACTION:UPDATE_NAME:Ama");
        let second = extract(&first.display_text);

        assert_eq!(second.display_text, first.display_text);
        assert!(second.actions.is_empty());
    }

    #[test]
    fn interior_lines_keep_original_order_and_blank_lines() {
        let reply = extract("Ligne 1\n\nLigne 3\nACTION:UPDATE_NAME:Ama\nLigne 5");
        assert_eq!(reply.display_text, "Ligne 1\n\nLigne 3\nLigne 5");
    }
}
