use super::currency::CurrencyPair;
use super::error::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Threshold alert on a currency pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub currency_pair: CurrencyPair,
    #[serde(with = "rust_decimal::serde::str")]
    pub threshold: Decimal,
    pub is_above: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl Alert {
    pub fn new(
        currency_pair: CurrencyPair,
        threshold: Decimal,
        is_above: bool,
    ) -> Result<Self, ValidationError> {
        if threshold <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveThreshold(threshold));
        }
        Ok(Self {
            currency_pair,
            threshold,
            is_above,
            enabled: true,
            created_at: Utc::now(),
            last_triggered: None,
        })
    }

    /// An enabled alert fires when the rate is strictly past its threshold.
    pub fn should_trigger(&self, current_rate: Decimal) -> bool {
        if !self.enabled {
            return false;
        }
        if self.is_above {
            current_rate > self.threshold
        } else {
            current_rate < self.threshold
        }
    }

    pub fn trigger(&mut self) {
        self.last_triggered = Some(Utc::now());
    }

    pub fn direction(&self) -> &'static str {
        if self.is_above { "above" } else { "below" }
    }
}
