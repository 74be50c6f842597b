use crate::core::{Alert, CurrencyPair, ExchangeRate, ValidationError};
use crate::store::disk;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Threshold alerts, at most one per currency pair, persisted as a JSON
/// object keyed by `SOURCE_TARGET`.
#[derive(Debug)]
pub struct AlertService {
    path: PathBuf,
    alerts: BTreeMap<String, Alert>,
}

impl AlertService {
    /// Reads the alert file. Entries that fail to parse are logged and dropped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut alerts = BTreeMap::new();
        for (key, value) in disk::load(&path) {
            match serde_json::from_value::<Alert>(value) {
                Ok(alert) if alert.threshold > Decimal::ZERO => {
                    alerts.insert(alert.currency_pair.cache_key(), alert);
                }
                Ok(alert) => {
                    warn!(key = %key, threshold = %alert.threshold, "Invalid alert threshold")
                }
                Err(e) => warn!(key = %key, error = %e, "Invalid alert data"),
            }
        }
        Self { path, alerts }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates or replaces the alert for `pair`.
    pub fn add_alert(
        &mut self,
        pair: CurrencyPair,
        threshold: Decimal,
        is_above: bool,
    ) -> Result<Alert, ValidationError> {
        let alert = Alert::new(pair, threshold, is_above)?;
        info!(
            pair = %alert.currency_pair,
            threshold = %threshold,
            is_above,
            "Alert added"
        );
        self.alerts
            .insert(alert.currency_pair.cache_key(), alert.clone());
        self.save();
        Ok(alert)
    }

    pub fn remove_alert(&mut self, pair: &CurrencyPair) -> bool {
        if self.alerts.remove(&pair.cache_key()).is_none() {
            return false;
        }
        info!(pair = %pair, "Alert removed");
        self.save();
        true
    }

    pub fn get_alert(&self, pair: &CurrencyPair) -> Option<&Alert> {
        self.alerts.get(&pair.cache_key())
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.values()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn enable_alert(&mut self, pair: &CurrencyPair) -> bool {
        self.set_enabled(pair, true)
    }

    pub fn disable_alert(&mut self, pair: &CurrencyPair) -> bool {
        self.set_enabled(pair, false)
    }

    fn set_enabled(&mut self, pair: &CurrencyPair, enabled: bool) -> bool {
        let Some(alert) = self.alerts.get_mut(&pair.cache_key()) else {
            return false;
        };
        alert.enabled = enabled;
        info!(pair = %pair, enabled, "Alert updated");
        self.save();
        true
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
        self.save();
        info!("All alerts cleared");
    }

    /// Fires the alert for the rate's pair if the rate is past its threshold.
    ///
    /// Returns the alerts that fired, with `last_triggered` already updated.
    pub fn check_alerts(&mut self, rate: &ExchangeRate) -> Vec<Alert> {
        let mut triggered = Vec::new();
        if let Some(alert) = self.alerts.get_mut(&rate.cache_key()) {
            if alert.should_trigger(rate.rate()) {
                alert.trigger();
                info!(
                    pair = %alert.currency_pair,
                    threshold = %alert.threshold,
                    rate = %rate.rate(),
                    "Alert triggered"
                );
                triggered.push(alert.clone());
            }
        }

        if !triggered.is_empty() {
            self.save();
        }
        triggered
    }

    fn save(&self) {
        if let Err(e) = disk::save(&self.path, &self.alerts) {
            error!(path = %self.path.display(), error = %e, "Failed to save alerts");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::tempdir;

    fn pair(source: &str, target: &str) -> CurrencyPair {
        CurrencyPair::new(source, target).unwrap()
    }

    fn rate(source: &str, target: &str, value: Decimal) -> ExchangeRate {
        ExchangeRate::new(&pair(source, target), value, Utc::now()).unwrap()
    }

    #[test]
    fn test_add_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        let mut service = AlertService::load(&path);
        service
            .add_alert(pair("USD", "EUR"), dec!(0.90), true)
            .unwrap();
        service
            .add_alert(pair("GBP", "JPY"), dec!(185), false)
            .unwrap();

        let reloaded = AlertService::load(&path);
        let alert = reloaded.get_alert(&pair("USD", "EUR")).unwrap();
        assert_eq!(alert.threshold, dec!(0.90));
        assert!(alert.is_above);
        assert_eq!(reloaded.alerts().count(), 2);
    }

    #[test]
    fn test_adding_same_pair_replaces_alert() {
        let dir = tempdir().unwrap();
        let mut service = AlertService::load(dir.path().join("alerts.json"));
        service
            .add_alert(pair("USD", "EUR"), dec!(0.90), true)
            .unwrap();
        service
            .add_alert(pair("USD", "EUR"), dec!(0.80), false)
            .unwrap();

        assert_eq!(service.alerts().count(), 1);
        let alert = service.get_alert(&pair("USD", "EUR")).unwrap();
        assert_eq!(alert.threshold, dec!(0.80));
        assert!(!alert.is_above);
    }

    #[test]
    fn test_non_positive_threshold_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        let mut service = AlertService::load(&path);

        let err = service
            .add_alert(pair("USD", "EUR"), dec!(-1), true)
            .unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveThreshold(dec!(-1)));
        assert!(service.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_alert() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        let mut service = AlertService::load(&path);
        service
            .add_alert(pair("USD", "EUR"), dec!(0.90), true)
            .unwrap();

        assert!(service.remove_alert(&pair("USD", "EUR")));
        assert!(!service.remove_alert(&pair("USD", "EUR")));
        assert!(AlertService::load(&path).is_empty());
    }

    #[test]
    fn test_check_alerts_triggers_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        let mut service = AlertService::load(&path);
        service
            .add_alert(pair("USD", "EUR"), dec!(0.90), true)
            .unwrap();

        assert!(service.check_alerts(&rate("USD", "EUR", dec!(0.85))).is_empty());
        assert!(service.check_alerts(&rate("USD", "GBP", dec!(5))).is_empty());

        let fired = service.check_alerts(&rate("USD", "EUR", dec!(0.95)));
        assert_eq!(fired.len(), 1);
        assert!(fired[0].last_triggered.is_some());

        let reloaded = AlertService::load(&path);
        assert!(
            reloaded
                .get_alert(&pair("USD", "EUR"))
                .unwrap()
                .last_triggered
                .is_some()
        );
    }

    #[test]
    fn test_disabled_alert_does_not_fire() {
        let dir = tempdir().unwrap();
        let mut service = AlertService::load(dir.path().join("alerts.json"));
        service
            .add_alert(pair("USD", "EUR"), dec!(0.90), false)
            .unwrap();

        assert!(service.disable_alert(&pair("USD", "EUR")));
        assert!(service.check_alerts(&rate("USD", "EUR", dec!(0.5))).is_empty());

        assert!(service.enable_alert(&pair("USD", "EUR")));
        assert_eq!(service.check_alerts(&rate("USD", "EUR", dec!(0.5))).len(), 1);

        assert!(!service.enable_alert(&pair("USD", "CHF")));
    }

    #[test]
    fn test_clear_empties_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        let mut service = AlertService::load(&path);
        service
            .add_alert(pair("USD", "EUR"), dec!(0.90), true)
            .unwrap();

        service.clear();
        assert!(service.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn test_invalid_entries_are_skipped_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        fs::write(
            &path,
            r#"{
                "USD_EUR": {
                    "currency_pair": {"source": "USD", "target": "EUR"},
                    "threshold": "0.9",
                    "is_above": true,
                    "created_at": "2025-01-01T00:00:00Z"
                },
                "USD_GBP": {
                    "currency_pair": {"source": "USD", "target": "GBP"},
                    "threshold": "-3",
                    "is_above": true,
                    "created_at": "2025-01-01T00:00:00Z"
                },
                "XXX_EUR": {
                    "currency_pair": {"source": "XXX", "target": "EUR"},
                    "threshold": "1",
                    "is_above": true,
                    "created_at": "2025-01-01T00:00:00Z"
                },
                "broken": {"threshold": "1"}
            }"#,
        )
        .unwrap();

        let service = AlertService::load(&path);
        let keys: Vec<String> = service
            .alerts()
            .map(|a| a.currency_pair.cache_key())
            .collect();
        assert_eq!(keys, vec!["USD_EUR"]);
        let alert = service.get_alert(&pair("USD", "EUR")).unwrap();
        assert!(alert.enabled);
        assert!(alert.last_triggered.is_none());
    }

    #[test]
    fn test_save_failure_keeps_alert_in_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), "x").unwrap();

        let mut service = AlertService::load(&path);
        service
            .add_alert(pair("USD", "EUR"), dec!(0.90), true)
            .unwrap();
        assert!(service.get_alert(&pair("USD", "EUR")).is_some());
    }
}
