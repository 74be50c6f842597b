//! Error types shared by the exchange-rate core

use rust_decimal::Decimal;
use thiserror::Error;

/// Longest provider response body carried inside a [`ExchangeError::Provider`].
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Input that fails the currency pair or rate invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Currency codes must be 3 uppercase letters, got: '{0}'")]
    MalformedCode(String),

    #[error("Invalid currency code: {0}")]
    UnknownCode(String),

    #[error("Source and target currencies must be different: {0}")]
    SameCurrency(String),

    #[error("Exchange rate must be positive, got: {0}")]
    NonPositiveRate(Decimal),

    #[error("Alert threshold must be positive, got: {0}")]
    NonPositiveThreshold(Decimal),

    #[error("Invalid currency pair '{0}', expected SOURCE/TARGET")]
    MalformedPair(String),
}

/// Failure of an exchange-rate lookup.
///
/// The type is `Clone` because a single in-flight fetch hands the same result
/// to every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("{message}")]
    Provider {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ExchangeError {
    pub fn provider(message: impl Into<String>) -> Self {
        ExchangeError::Provider {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Provider failure that came with an HTTP response.
    pub fn http(status: u16, body: &str) -> Self {
        let body = if body.is_empty() {
            None
        } else {
            Some(truncate_chars(body, MAX_ERROR_BODY_CHARS))
        };
        ExchangeError::Provider {
            message: format!("API error: {status}"),
            status: Some(status),
            body,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::Provider { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, ExchangeError::Provider { .. })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Configuration value outside of what the core accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max}, got: {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}
