//! Core domain types and abstractions

pub mod alert;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;

// Re-export main types for cleaner imports
pub use alert::Alert;
pub use currency::{CurrencyPair, ExchangeRate, RateProvider};
pub use error::{ConfigError, ExchangeError, ValidationError};
