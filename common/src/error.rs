//! Error types for the shared RateDesk types.

use thiserror::Error;

use crate::Currency;

/// Error when attempting arithmetic on amounts in different currencies.
#[derive(Debug, Clone, Error)]
#[error("Currency mismatch: expected {expected}, got {actual}")]
pub struct CurrencyMismatchError {
    pub expected: Currency,
    pub actual: Currency,
}

/// Errors raised while parsing currency codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyError {
    /// Not a three-letter alphabetic ISO 4217 code.
    #[error("Invalid currency code: {0:?}")]
    InvalidCode(String),
}
