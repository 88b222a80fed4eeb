//! Text renderings of the product catalog and pending cart. These feed
//! the assistant's context window and outbound confirmations, so they
//! are deliberately pure functions over already-loaded products.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::domain::product::{Product, ProductId};

/// Stock level at or below which the rendering flags scarcity.
pub const LOW_STOCK_THRESHOLD: u32 = 5;

const FALLBACK_CATEGORY: &str = "Divers";

/// French-style amount rendering: digits grouped in threes, comma as the
/// decimal separator.
pub fn format_amount(amount: Decimal) -> String {
    let normalized = amount.normalize();
    let text = normalized.to_string();
    let (integer_part, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (text.as_str(), None),
    };
    let (sign, digits) = match integer_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, character) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(character);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped},{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Catalog rendering the assistant answers from: grouped by category,
/// with a scarcity flag on low-stock items.
pub fn render_for_assistant(products: &[Product], currency: &str) -> String {
    if products.is_empty() {
        return "Aucun produit disponible pour le moment.".to_string();
    }

    let mut categories: BTreeMap<String, Vec<&Product>> = BTreeMap::new();
    for product in products {
        let category = if product.category.trim().is_empty() {
            FALLBACK_CATEGORY.to_string()
        } else {
            product.category.clone()
        };
        categories.entry(category).or_default().push(product);
    }

    let mut lines = vec!["📦 *CATALOGUE DISPONIBLE :*".to_string(), String::new()];
    for (category, items) in &categories {
        lines.push(format!("*{}*", category.to_uppercase()));
        for product in items {
            let stock_alert = if product.stock <= LOW_STOCK_THRESHOLD {
                format!(" ⚠️ Plus que {} en stock !", product.stock)
            } else {
                String::new()
            };
            lines.push(format!(
                "  • *{}* — {} {}{}",
                product.name,
                format_amount(product.price),
                currency,
                stock_alert
            ));
            lines.push(format!("    {}", product.description));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Cart line rendering for the assistant's user turn. Entries whose
/// product is no longer known are skipped.
pub fn cart_summary(cart: &BTreeMap<ProductId, u32>, products: &[Product]) -> String {
    if cart.is_empty() {
        return "vide".to_string();
    }

    let items: Vec<String> = cart
        .iter()
        .filter_map(|(product_id, quantity)| {
            products
                .iter()
                .find(|product| &product.id == product_id)
                .map(|product| format!("{} x{}", product.name, quantity))
        })
        .collect();

    if items.is_empty() {
        "vide".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::{cart_summary, format_amount, render_for_assistant};
    use crate::domain::merchant::MerchantId;
    use crate::domain::product::{Product, ProductId};

    fn product(id: &str, name: &str, price: i64, stock: u32, category: &str) -> Product {
        Product {
            id: ProductId(id.to_string()),
            merchant_id: MerchantId("m-1".to_string()),
            name: name.to_string(),
            description: format!("Description de {name}"),
            price: Decimal::from(price),
            stock,
            category: category.to_string(),
            is_available: stock > 0,
        }
    }

    #[test]
    fn amounts_group_digits_in_threes() {
        assert_eq!(format_amount(Decimal::from(500)), "500");
        assert_eq!(format_amount(Decimal::from(2000)), "2 000");
        assert_eq!(format_amount(Decimal::from(1_250_000)), "1 250 000");
        assert_eq!(format_amount(Decimal::new(150050, 2)), "1 500,5");
    }

    #[test]
    fn empty_catalog_renders_placeholder() {
        assert_eq!(
            render_for_assistant(&[], "FCFA"),
            "Aucun produit disponible pour le moment."
        );
    }

    #[test]
    fn catalog_groups_by_category_and_flags_low_stock() {
        let products = vec![
            product("p-1", "Pagne wax", 12000, 3, "Tissus"),
            product("p-2", "Sandales cuir", 8000, 40, "Chaussures"),
        ];
        let rendered = render_for_assistant(&products, "FCFA");

        assert!(rendered.contains("*TISSUS*"));
        assert!(rendered.contains("*CHAUSSURES*"));
        assert!(rendered.contains("Pagne wax"));
        assert!(rendered.contains("Plus que 3 en stock !"));
        assert!(!rendered.contains("Plus que 40"));
    }

    #[test]
    fn blank_category_falls_back_to_divers() {
        let products = vec![product("p-1", "Savon karité", 500, 10, "  ")];
        assert!(render_for_assistant(&products, "FCFA").contains("*DIVERS*"));
    }

    #[test]
    fn cart_summary_skips_unknown_products() {
        let products = vec![product("p-1", "Pagne wax", 12000, 3, "Tissus")];
        let mut cart = BTreeMap::new();
        cart.insert(ProductId("p-1".to_string()), 2);
        cart.insert(ProductId("ghost".to_string()), 1);

        assert_eq!(cart_summary(&cart, &products), "Pagne wax x2");
    }

    #[test]
    fn empty_cart_reads_vide() {
        assert_eq!(cart_summary(&BTreeMap::new(), &[]), "vide");
    }
}
