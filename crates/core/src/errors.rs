use thiserror::Error;

use crate::domain::order::OrderStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid order transition from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use crate::domain::order::OrderStatus;
    use crate::errors::{ApplicationError, DomainError};

    #[test]
    fn domain_error_wraps_into_application_error() {
        let error = ApplicationError::from(DomainError::InvalidOrderTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        });

        assert!(matches!(error, ApplicationError::Domain(_)));
        assert!(error.to_string().contains("invalid order transition"));
    }

    #[test]
    fn persistence_error_keeps_context_message() {
        let error = ApplicationError::Persistence("database lock timeout".to_owned());
        assert_eq!(error.to_string(), "persistence failure: database lock timeout");
    }
}
