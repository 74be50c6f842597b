use crate::alerts::AlertService;
use crate::core::config::{AppConfig, validate_monitoring_interval};
use crate::core::{
    Alert, ConfigError, CurrencyPair, ExchangeError, ExchangeRate, RateProvider, ValidationError,
};
use crate::exchange::{ExchangeRateService, RateQuote};
use anyhow::Result;
use std::future::Future;
use tracing::{debug, error, info};

/// An alert that fired together with the rate that fired it.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    pub alert: Alert,
    pub rate: ExchangeRate,
}

/// Result of a single rate lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RateCheck {
    pub quote: RateQuote,
    pub triggered: Vec<Alert>,
}

/// Normalizes user input (`usd`, ` eur `) before validating it as a pair.
pub fn parse_pair(source: &str, target: &str) -> Result<CurrencyPair, ValidationError> {
    CurrencyPair::new(
        source.trim().to_ascii_uppercase(),
        target.trim().to_ascii_uppercase(),
    )
}

pub struct App {
    config: AppConfig,
    exchange: ExchangeRateService,
    alerts: AlertService,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let exchange = ExchangeRateService::new(&config)?;
        let alerts = AlertService::load(config.alerts_file()?);
        Ok(Self {
            config,
            exchange,
            alerts,
        })
    }

    pub fn with_provider(config: AppConfig, provider: impl RateProvider + 'static) -> Result<Self> {
        let exchange = ExchangeRateService::with_provider(&config, provider)?;
        let alerts = AlertService::load(config.alerts_file()?);
        Ok(Self {
            config,
            exchange,
            alerts,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn exchange(&self) -> &ExchangeRateService {
        &self.exchange
    }

    pub fn alerts(&self) -> &AlertService {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut AlertService {
        &mut self.alerts
    }

    /// Looks up a rate and fires any alert it crosses.
    pub async fn exchange_rate(
        &mut self,
        source: &str,
        target: &str,
        update: bool,
    ) -> Result<RateCheck, ExchangeError> {
        let pair = parse_pair(source, target)?;
        let quote = self
            .exchange
            .get_rate_quote(&pair, update)
            .await
            .inspect_err(|e| error!(pair = %pair, error = %e, "Failed to get exchange rate"))?;
        let triggered = self.alerts.check_alerts(&quote.rate);
        Ok(RateCheck { quote, triggered })
    }

    /// Refreshes the full rate set and checks every alert against it.
    pub async fn update_all_rates(&mut self) -> Result<Vec<TriggeredAlert>, ExchangeError> {
        let rates = self.exchange.get_all_rates().await?;
        info!(count = rates.len(), "Updated all exchange rates");

        let mut triggered = Vec::new();
        for rate in rates {
            for alert in self.alerts.check_alerts(&rate) {
                triggered.push(TriggeredAlert {
                    alert,
                    rate: rate.clone(),
                });
            }
        }
        Ok(triggered)
    }

    /// Fetches the rate of every enabled alert's pair once.
    ///
    /// A failing pair is logged and skipped; the others are still checked.
    pub async fn check_enabled_alerts(&mut self) -> Vec<TriggeredAlert> {
        let pairs: Vec<CurrencyPair> = self
            .alerts
            .alerts()
            .filter(|alert| alert.enabled)
            .map(|alert| alert.currency_pair.clone())
            .collect();
        if pairs.is_empty() {
            debug!("No enabled alerts to check");
            return Vec::new();
        }
        info!(count = pairs.len(), "Checking alerts");

        let mut triggered = Vec::new();
        for pair in pairs {
            match self.exchange.get_exchange_rate(&pair, false).await {
                Ok(rate) => {
                    debug!(pair = %pair, rate = %rate.rate(), "Checked alert");
                    for alert in self.alerts.check_alerts(&rate) {
                        triggered.push(TriggeredAlert {
                            alert,
                            rate: rate.clone(),
                        });
                    }
                }
                Err(e) => error!(pair = %pair, error = %e, "Failed to check alert"),
            }
        }
        triggered
    }

    /// Checks enabled alerts every `interval_secs` until `shutdown` resolves.
    ///
    /// `on_trigger` sees each alert as it fires. A shutdown that arrives
    /// mid-check abandons the check; fetches already started still complete
    /// in the background.
    pub async fn run_monitoring_loop<S, F>(
        &mut self,
        interval_secs: u64,
        shutdown: S,
        mut on_trigger: F,
    ) -> Result<(), ConfigError>
    where
        S: Future<Output = ()>,
        F: FnMut(&TriggeredAlert),
    {
        let interval = validate_monitoring_interval(interval_secs)?;
        info!(interval_seconds = interval_secs, "Starting monitoring loop");
        tokio::pin!(shutdown);

        loop {
            let cycle = async {
                for fired in self.check_enabled_alerts().await {
                    on_trigger(&fired);
                }
                tokio::time::sleep(interval).await;
            };
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Monitoring loop cancelled");
                    return Ok(());
                }
                _ = cycle => {}
            }
        }
    }

    pub async fn close(self) {
        self.exchange.close().await;
    }
}
