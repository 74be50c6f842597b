//! Currency pairs, exchange rates and the provider abstraction

use super::error::{ExchangeError, ValidationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Widely traded ISO 4217 codes. Only these have display names.
pub const COMMON_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "CNY", "SEK", "NZD", "MXN", "SGD", "HKD",
    "NOK", "KRW", "TRY", "RUB", "INR", "BRL", "ZAR", "PLN", "THB", "IDR", "HUF", "CZK", "ILS",
    "CLP", "PHP", "AED", "COP", "SAR", "MYR", "RON", "BGN", "HRK", "DKK", "ISK", "BAM", "ALL",
    "MKD",
];

const EXTENDED_CURRENCIES: &[&str] = &[
    "UAH", "VND", "EGP", "NGN", "BDT", "PKR", "KES", "UGX", "TZS", "ETB", "GHS", "MAD", "TND",
    "DZD", "LYD", "SDG", "SSP", "SOS", "DJF", "KMF", "BIF", "RWF", "CDF", "GNF", "MRO", "STD",
    "CVE", "GMD", "GWP", "XOF", "XAF", "XPF", "CLF", "BOV", "UYI", "UYW", "BWP", "NAD", "SZL",
    "LSL", "ZMW", "ZWL", "BND", "KHR", "LAK", "MMK", "NPR", "LKR", "MVR", "BTN",
];

/// Returns true if `code` is on the currency allow-list.
pub fn is_supported_currency(code: &str) -> bool {
    COMMON_CURRENCIES.contains(&code) || EXTENDED_CURRENCIES.contains(&code)
}

/// Every supported code, common currencies first.
pub fn supported_currencies() -> impl Iterator<Item = &'static str> {
    COMMON_CURRENCIES
        .iter()
        .chain(EXTENDED_CURRENCIES.iter())
        .copied()
}

pub fn currency_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "USD" => "US Dollar",
        "EUR" => "Euro",
        "GBP" => "British Pound",
        "JPY" => "Japanese Yen",
        "AUD" => "Australian Dollar",
        "CAD" => "Canadian Dollar",
        "CHF" => "Swiss Franc",
        "CNY" => "Chinese Yuan",
        "SEK" => "Swedish Krona",
        "NZD" => "New Zealand Dollar",
        "MXN" => "Mexican Peso",
        "SGD" => "Singapore Dollar",
        "HKD" => "Hong Kong Dollar",
        "NOK" => "Norwegian Krone",
        "KRW" => "South Korean Won",
        "TRY" => "Turkish Lira",
        "RUB" => "Russian Ruble",
        "INR" => "Indian Rupee",
        "BRL" => "Brazilian Real",
        "ZAR" => "South African Rand",
        "PLN" => "Polish Złoty",
        "THB" => "Thai Baht",
        "IDR" => "Indonesian Rupiah",
        "HUF" => "Hungarian Forint",
        "CZK" => "Czech Koruna",
        "ILS" => "Israeli Shekel",
        "CLP" => "Chilean Peso",
        "PHP" => "Philippine Peso",
        "AED" => "UAE Dirham",
        "COP" => "Colombian Peso",
        "SAR" => "Saudi Riyal",
        "MYR" => "Malaysian Ringgit",
        "RON" => "Romanian Leu",
        "BGN" => "Bulgarian Lev",
        "HRK" => "Croatian Kuna",
        "DKK" => "Danish Krone",
        "ISK" => "Icelandic Króna",
        "BAM" => "Bosnia-Herzegovina Convertible Mark",
        "ALL" => "Albanian Lek",
        "MKD" => "Macedonian Denar",
        _ => return None,
    };
    Some(name)
}

/// Formats an amount with the number of minor units the currency uses.
pub fn format_amount(amount: Decimal, code: &str) -> String {
    let precision = match code {
        "JPY" | "KRW" | "IDR" | "VND" | "BYN" => 0,
        "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
        _ => 2,
    };
    let rounded = amount.round_dp_with_strategy(precision, RoundingStrategy::ToZero);
    format!("{rounded:.prec$} {code}", prec = precision as usize)
}

fn validate_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::MalformedCode(code.to_string()));
    }
    if !is_supported_currency(code) {
        return Err(ValidationError::UnknownCode(code.to_string()));
    }
    Ok(())
}

/// An ordered (source, target) pair of distinct, supported currency codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPair")]
pub struct CurrencyPair {
    source: String,
    target: String,
}

#[derive(Deserialize)]
struct RawPair {
    source: String,
    target: String,
}

impl TryFrom<RawPair> for CurrencyPair {
    type Error = ValidationError;

    fn try_from(raw: RawPair) -> Result<Self, Self::Error> {
        CurrencyPair::new(raw.source, raw.target)
    }
}

impl CurrencyPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Result<Self, ValidationError> {
        let source = source.into();
        let target = target.into();
        validate_code(&source)?;
        validate_code(&target)?;
        if source == target {
            return Err(ValidationError::SameCurrency(source));
        }
        Ok(Self { source, target })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Key used by the rate cache and the alert file, e.g. `USD_EUR`.
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.source, self.target)
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source, self.target)
    }
}

impl FromStr for CurrencyPair {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, target) = s
            .split_once('/')
            .ok_or_else(|| ValidationError::MalformedPair(s.to_string()))?;
        CurrencyPair::new(source.trim(), target.trim())
    }
}

/// A positive rate quoted for one unit of `source` in `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRate {
    source: String,
    target: String,
    rate: Decimal,
    timestamp: DateTime<Utc>,
    source_name: Option<String>,
    target_name: Option<String>,
}

impl ExchangeRate {
    pub fn new(
        pair: &CurrencyPair,
        rate: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if rate <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveRate(rate));
        }
        Ok(Self {
            source: pair.source.clone(),
            target: pair.target.clone(),
            rate,
            timestamp,
            source_name: None,
            target_name: None,
        })
    }

    /// Attaches the display names of both currencies, where known.
    pub fn with_names(mut self) -> Self {
        self.source_name = currency_name(&self.source).map(str::to_string);
        self.target_name = currency_name(&self.target).map(str::to_string);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.source, self.target)
    }

    pub fn format_rate(&self, precision: u32) -> String {
        format!(
            "1 {} = {:.prec$} {}",
            self.source,
            self.rate,
            self.target,
            prec = precision as usize
        )
    }
}

impl Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "1 {} = {} {}", self.source, self.rate, self.target)
    }
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches the current rate for a single pair with one remote request.
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<ExchangeRate, ExchangeError>;

    /// Fetches every rate the provider offers in one operation.
    async fn fetch_all_rates(&self) -> Result<Vec<ExchangeRate>, ExchangeError>;
}
