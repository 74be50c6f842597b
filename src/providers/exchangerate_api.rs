use super::util::RetryPolicy;
use crate::core::config::AppConfig;
use crate::core::{CurrencyPair, ExchangeError, ExchangeRate, RateProvider};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider backed by the `GET {base_url}/latest/{SOURCE}` endpoint.
pub struct ExchangeRateApiProvider {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    #[serde(default)]
    rates: HashMap<String, Value>,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fxwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| ExchangeError::provider(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ExchangeError> {
        Self::new(
            &config.api_url,
            config.request_timeout(),
            RetryPolicy::new(config.retry_attempts, config.retry_base_delay()),
        )
    }

    async fn request_latest(&self, url: &str) -> Result<LatestRatesResponse, ExchangeError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                error!(url, "API timeout error");
                ExchangeError::provider(format!("API request timed out: {e}"))
            } else if e.is_connect() {
                error!(url, error = %e, "API connection error");
                ExchangeError::provider(format!("Failed to connect to API: {e}"))
            } else {
                error!(url, error = %e, "API request error");
                ExchangeError::provider(format!("API request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), url, "API HTTP error");
            return Err(ExchangeError::http(status.as_u16(), &body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::provider(format!("Failed to read API response: {e}")))?;

        serde_json::from_str(&text)
            .map_err(|e| ExchangeError::provider(format!("Failed to parse API response: {e}")))
    }
}

/// Reads a rate that the API may send either as a JSON number or a string.
fn parse_rate(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    #[instrument(
        name = "ExchangeRateFetch",
        skip(self),
        fields(pair = %pair)
    )]
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<ExchangeRate, ExchangeError> {
        info!(
            source = pair.source(),
            target = pair.target(),
            "Fetching exchange rate"
        );
        let url = format!("{}/latest/{}", self.base_url, pair.source());
        debug!("Requesting exchange rates from {}", url);

        let data = self.retry.run(|| self.request_latest(&url)).await?;

        let raw_rate = match data.rates.get(pair.target()) {
            Some(value) => value,
            None => {
                let mut available: Vec<&str> = data.rates.keys().map(String::as_str).collect();
                available.sort_unstable();
                error!(
                    source = pair.source(),
                    target = pair.target(),
                    available_rates = ?available,
                    "Rate not found in API response"
                );
                return Err(ExchangeError::provider(format!(
                    "Rate not found for {} (available: {})",
                    pair.target(),
                    available.join(", ")
                )));
            }
        };

        let rate = parse_rate(raw_rate).ok_or_else(|| {
            error!(rate = %raw_rate, "Unparseable rate from API");
            ExchangeError::provider(format!("Invalid rate received from API: {raw_rate}"))
        })?;
        if rate <= Decimal::ZERO {
            error!(rate = %rate, "Invalid rate from API");
            return Err(ExchangeError::provider(format!(
                "Invalid rate received from API: {rate}"
            )));
        }

        Ok(ExchangeRate::new(pair, rate, Utc::now())?.with_names())
    }

    /// The `/latest/{SOURCE}` API has no single call returning every pair, so
    /// this provider reports an empty set.
    async fn fetch_all_rates(&self) -> Result<Vec<ExchangeRate>, ExchangeError> {
        debug!("Full rate set is not offered by this provider");
        Ok(Vec::new())
    }
}
