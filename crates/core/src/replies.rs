//! The only three canned texts a customer can ever receive on a failure
//! path. Raw error detail never reaches the customer.

/// Merchant subscription expired or never started.
pub const SERVICE_UNAVAILABLE: &str =
    "Ce service est temporairement indisponible. Veuillez contacter le propriétaire de la boutique.";

/// Plan's monthly assistant-message quota exhausted.
pub const QUOTA_EXCEEDED: &str =
    "Notre assistant est temporairement indisponible. Veuillez réessayer en début de mois. 🙏";

/// Assistant generation failed (transport or model error).
pub const TECHNICAL_FALLBACK: &str =
    "Désolé, petit problème technique. Pouvez-vous répéter ? 🙏";
