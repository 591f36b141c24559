//! FX engine error types.

use ratedesk_common::{Currency, CurrencyMismatchError, CurrencyPair};
use thiserror::Error;

/// Errors that can occur in the FX engine.
#[derive(Debug, Error)]
pub enum FxError {
    /// The pair cannot be resolved directly, by inversion or via a bridge currency.
    #[error("Rate not available for {from}/{to}")]
    UnsupportedPair { from: Currency, to: Currency },

    /// A quote was requested for a pair with no configured corridor.
    #[error("No corridor configured for {0}")]
    CorridorNotFound(CurrencyPair),

    /// The corridor exists but is switched off.
    #[error("Corridor {0} is disabled")]
    CorridorDisabled(CurrencyPair),

    /// Amount is zero, negative or otherwise unusable.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backing key-value store could not be reached or refused the operation.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store call exceeded its deadline.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Stored bytes could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Arithmetic across different currencies.
    #[error(transparent)]
    CurrencyMismatch(#[from] CurrencyMismatchError),
}

impl FxError {
    /// Shorthand for an unsupported pair error.
    pub fn unsupported(pair: &CurrencyPair) -> Self {
        FxError::UnsupportedPair {
            from: pair.source.clone(),
            to: pair.target.clone(),
        }
    }

    /// Whether the caller caused the error (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FxError::UnsupportedPair { .. }
                | FxError::CorridorNotFound(_)
                | FxError::CorridorDisabled(_)
                | FxError::InvalidAmount(_)
                | FxError::CurrencyMismatch(_)
        )
    }

    /// Check if this error is retryable without a configuration change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FxError::StoreUnavailable(_) | FxError::Timeout(_))
    }

    /// Get a stable error code for transport layers.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::UnsupportedPair { .. } => "RATE_NOT_AVAILABLE",
            FxError::CorridorNotFound(_) => "CORRIDOR_NOT_FOUND",
            FxError::CorridorDisabled(_) => "CORRIDOR_DISABLED",
            FxError::InvalidAmount(_) => "INVALID_AMOUNT",
            FxError::InvalidConfig(_) => "INVALID_CONFIG",
            FxError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            FxError::Timeout(_) => "TIMEOUT",
            FxError::Serialization(_) => "SERIALIZATION_ERROR",
            FxError::CurrencyMismatch(_) => "CURRENCY_MISMATCH",
        }
    }
}

impl From<serde_json::Error> for FxError {
    fn from(e: serde_json::Error) -> Self {
        FxError::Serialization(e.to_string())
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
