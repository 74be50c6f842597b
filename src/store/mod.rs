pub mod disk;

use crate::core::{CurrencyPair, ExchangeRate, ValidationError};
use chrono::{DateTime, Utc};
use disk::StoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// On-disk form of a cached rate. The decimal is kept as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source: String,
    pub target: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl From<&ExchangeRate> for CacheEntry {
    fn from(rate: &ExchangeRate) -> Self {
        CacheEntry {
            source: rate.source().to_string(),
            target: rate.target().to_string(),
            rate: rate.rate(),
            timestamp: rate.timestamp(),
        }
    }
}

impl TryFrom<CacheEntry> for ExchangeRate {
    type Error = ValidationError;

    fn try_from(entry: CacheEntry) -> Result<Self, Self::Error> {
        let pair = CurrencyPair::new(entry.source, entry.target)?;
        Ok(ExchangeRate::new(&pair, entry.rate, entry.timestamp)?.with_names())
    }
}

/// Last-known rates persisted as one JSON object keyed by `SOURCE_TARGET`.
#[derive(Debug, Clone)]
pub struct RateCacheStore {
    path: PathBuf,
}

impl RateCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every valid rate in the cache file, keyed by its pair.
    ///
    /// Bad entries, including ones filed under another pair's key, are logged
    /// and skipped.
    pub fn load_rates(&self) -> BTreeMap<String, ExchangeRate> {
        let mut rates = BTreeMap::new();
        for (key, value) in disk::load(&self.path) {
            let parsed = serde_json::from_value::<CacheEntry>(value)
                .map_err(|e| e.to_string())
                .and_then(|entry| ExchangeRate::try_from(entry).map_err(|e| e.to_string()));
            match parsed {
                Ok(rate) if rate.cache_key() == key => {
                    rates.insert(key, rate);
                }
                Ok(rate) => warn!(
                    key = %key,
                    pair = %rate.cache_key(),
                    "Invalid cache entry: key does not match its pair"
                ),
                Err(error) => warn!(key = %key, error = %error, "Invalid cache entry"),
            }
        }
        rates
    }

    /// Merges one rate into the existing file, keeping every other entry.
    pub fn save_rate(&self, rate: &ExchangeRate) -> Result<(), StoreError> {
        let mut data = disk::load(&self.path);
        let entry = serde_json::to_value(CacheEntry::from(rate)).map_err(StoreError::Serialize)?;
        data.insert(rate.cache_key(), entry);
        disk::save(&self.path, &data)
    }

    /// Replaces the whole file with `rates` in a single write.
    pub fn save_rates<'a>(
        &self,
        rates: impl IntoIterator<Item = &'a ExchangeRate>,
    ) -> Result<(), StoreError> {
        let data: BTreeMap<String, CacheEntry> = rates
            .into_iter()
            .map(|rate| (rate.cache_key(), CacheEntry::from(rate)))
            .collect();
        disk::save(&self.path, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::tempdir;

    fn rate(source: &str, target: &str, value: Decimal) -> ExchangeRate {
        let pair = CurrencyPair::new(source, target).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        ExchangeRate::new(&pair, value, ts).unwrap().with_names()
    }

    #[test]
    fn test_save_and_load_preserves_every_field() {
        let dir = tempdir().unwrap();
        let store = RateCacheStore::new(dir.path().join("currencies.json"));
        let original = rate("USD", "EUR", dec!(0.850012345678901234));

        store.save_rate(&original).unwrap();
        let loaded = store.load_rates();

        assert_eq!(loaded.get("USD_EUR"), Some(&original));
        assert_eq!(loaded["USD_EUR"].rate().to_string(), "0.850012345678901234");
    }

    #[test]
    fn test_file_format() {
        let dir = tempdir().unwrap();
        let store = RateCacheStore::new(dir.path().join("currencies.json"));
        store.save_rate(&rate("USD", "EUR", dec!(0.8500))).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let entry = &raw["USD_EUR"];
        assert_eq!(entry["source"], "USD");
        assert_eq!(entry["target"], "EUR");
        assert_eq!(entry["rate"], "0.8500");
        assert_eq!(entry["timestamp"], "2025-03-14T09:26:53Z");
    }

    #[test]
    fn test_save_rate_merges_with_existing_entries() {
        let dir = tempdir().unwrap();
        let store = RateCacheStore::new(dir.path().join("currencies.json"));
        store.save_rate(&rate("USD", "EUR", dec!(0.85))).unwrap();
        store.save_rate(&rate("GBP", "USD", dec!(1.27))).unwrap();
        store.save_rate(&rate("USD", "EUR", dec!(0.86))).unwrap();

        let loaded = store.load_rates();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["USD_EUR"].rate(), dec!(0.86));
        assert_eq!(loaded["GBP_USD"].rate(), dec!(1.27));
    }

    #[test]
    fn test_save_rates_replaces_file() {
        let dir = tempdir().unwrap();
        let store = RateCacheStore::new(dir.path().join("currencies.json"));
        store.save_rate(&rate("USD", "EUR", dec!(0.85))).unwrap();

        let fresh = [rate("AUD", "NZD", dec!(1.08)), rate("CHF", "SEK", dec!(11.9))];
        store.save_rates(&fresh).unwrap();

        let loaded = store.load_rates();
        assert_eq!(loaded.len(), 2);
        assert!(!loaded.contains_key("USD_EUR"));
    }

    #[test]
    fn test_entry_under_another_pairs_key_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("currencies.json");
        fs::write(
            &path,
            r#"{
                "USD_EUR": {"source": "GBP", "target": "JPY", "rate": "190.5", "timestamp": "2025-01-01T00:00:00Z"},
                "GBP_USD": {"source": "GBP", "target": "USD", "rate": "1.27", "timestamp": "2025-01-01T00:00:00Z"}
            }"#,
        )
        .unwrap();

        let loaded = RateCacheStore::new(path).load_rates();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["GBP_USD"]);
        assert!(loaded.values().all(|rate| rate.source() == "GBP" && rate.target() == "USD"));
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("currencies.json");
        fs::write(
            &path,
            r#"{
                "USD_EUR": {"source": "USD", "target": "EUR", "rate": "0.85", "timestamp": "2025-01-01T00:00:00Z"},
                "USD_GBP": {"source": "USD", "target": "GBP", "rate": "-2", "timestamp": "2025-01-01T00:00:00Z"},
                "USD_USD": {"source": "USD", "target": "USD", "rate": "1", "timestamp": "2025-01-01T00:00:00Z"},
                "USD_JPY": {"source": "USD", "target": "JPY"},
                "junk": 42
            }"#,
        )
        .unwrap();

        let loaded = RateCacheStore::new(path).load_rates();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["USD_EUR"]);
    }
}
