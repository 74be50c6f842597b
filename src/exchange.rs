//! Exchange-rate acquisition: freshness check, request deduplication,
//! rate-limited fetching, persistence and stale fallback.

use crate::core::config::AppConfig;
use crate::core::{CurrencyPair, ExchangeError, ExchangeRate, RateProvider};
use crate::providers::exchangerate_api::ExchangeRateApiProvider;
use crate::providers::limiter::TokenBucketLimiter;
use crate::store::RateCacheStore;
use anyhow::Result;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Where a returned rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served from memory within the cache TTL.
    Cached,
    /// Fetched from the provider for this request.
    Fetched,
    /// The fetch failed and an older cached value was returned instead.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub rate: ExchangeRate,
    pub freshness: Freshness,
}

type FetchOutcome = Result<RateQuote, ExchangeError>;
type PendingFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// In-memory rates. Freshness is tracked once for the whole cache, not per entry.
#[derive(Default)]
struct RateCache {
    entries: HashMap<String, ExchangeRate>,
    last_update: Option<Instant>,
}

impl RateCache {
    fn fresh(&self, key: &str, ttl: Duration) -> Option<&ExchangeRate> {
        let last_update = self.last_update?;
        if last_update.elapsed() >= ttl {
            return None;
        }
        self.entries.get(key)
    }

    fn touch(&mut self) {
        self.last_update = Some(Instant::now());
    }
}

struct Inner {
    provider: Box<dyn RateProvider>,
    limiter: TokenBucketLimiter,
    store: RateCacheStore,
    cache_ttl: Duration,
    rates: Mutex<RateCache>,
    pending: Mutex<HashMap<String, PendingFetch>>,
    // Serializes read-merge-write cycles on the cache file
    persist_lock: Mutex<()>,
}

pub struct ExchangeRateService {
    inner: Arc<Inner>,
}

impl ExchangeRateService {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let provider = ExchangeRateApiProvider::from_config(config)?;
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: &AppConfig, provider: impl RateProvider + 'static) -> Result<Self> {
        config.validate()?;
        let store = RateCacheStore::new(config.currencies_file()?);
        let entries: HashMap<String, ExchangeRate> = store.load_rates().into_iter().collect();
        debug!(
            "Loaded {} cached rates from {}",
            entries.len(),
            store.path().display()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                provider: Box::new(provider),
                limiter: TokenBucketLimiter::new(config.max_requests_per_minute),
                store,
                cache_ttl: config.cache_ttl(),
                rates: Mutex::new(RateCache {
                    entries,
                    last_update: None,
                }),
                pending: Mutex::new(HashMap::new()),
                persist_lock: Mutex::new(()),
            }),
        })
    }

    pub async fn get_exchange_rate(
        &self,
        pair: &CurrencyPair,
        force_update: bool,
    ) -> Result<ExchangeRate, ExchangeError> {
        self.get_rate_quote(pair, force_update)
            .await
            .map(|quote| quote.rate)
    }

    /// Returns the rate for `pair` along with where it came from.
    ///
    /// Concurrent callers for the same pair share one fetch and all observe
    /// its result. The fetch runs on its own task, so a caller that goes away
    /// does not stop it from completing and updating the cache.
    pub async fn get_rate_quote(
        &self,
        pair: &CurrencyPair,
        force_update: bool,
    ) -> Result<RateQuote, ExchangeError> {
        let key = pair.cache_key();

        if !force_update {
            let rates = self.inner.rates.lock().await;
            if let Some(rate) = rates.fresh(&key, self.inner.cache_ttl) {
                info!(pair = %key, "Returning cached exchange rate");
                return Ok(RateQuote {
                    rate: rate.clone(),
                    freshness: Freshness::Cached,
                });
            }
        }

        let fetch = {
            let mut pending = self.inner.pending.lock().await;
            match pending.get(&key) {
                Some(in_flight) => {
                    debug!(pair = %key, "Deduplicating request");
                    in_flight.clone()
                }
                None => {
                    let fetch = Arc::clone(&self.inner)
                        .fetch_and_store(pair.clone())
                        .boxed()
                        .shared();
                    pending.insert(key, fetch.clone());
                    // The task drives the fetch even if every caller is dropped
                    tokio::spawn(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Fetches the full rate set and makes it the entire cache.
    ///
    /// When the provider fails, every entry of the cache file is returned
    /// instead. The HTTP provider has no full-set endpoint and yields an empty
    /// set, which empties the cache.
    pub async fn get_all_rates(&self) -> Result<Vec<ExchangeRate>, ExchangeError> {
        self.inner.limiter.acquire().await;

        let rates = match self.inner.provider.fetch_all_rates().await {
            Ok(rates) => rates,
            Err(e) => {
                error!(error = %e, "Failed to fetch all rates");
                let cached: Vec<ExchangeRate> =
                    self.inner.store.load_rates().into_values().collect();
                warn!(count = cached.len(), "Returning rates from the cache file");
                return Ok(cached);
            }
        };

        {
            let mut cache = self.inner.rates.lock().await;
            cache.entries = rates
                .iter()
                .map(|rate| (rate.cache_key(), rate.clone()))
                .collect();
            cache.touch();
        }

        let _guard = self.inner.persist_lock.lock().await;
        self.inner.store.save_rates(&rates).map_err(|e| {
            error!(error = %e, "Failed to save all rates to cache");
            ExchangeError::Cache(format!("Failed to save all rates to cache: {e}"))
        })?;

        info!(count = rates.len(), "Updated all exchange rates");
        Ok(rates)
    }

    /// Snapshot of every rate held in memory, fresh or not, sorted by key.
    pub async fn cached_rates(&self) -> Vec<ExchangeRate> {
        let cache = self.inner.rates.lock().await;
        let mut rates: Vec<ExchangeRate> = cache.entries.values().cloned().collect();
        rates.sort_by_key(|rate| rate.cache_key());
        rates
    }

    pub async fn is_cache_valid(&self, pair: &CurrencyPair) -> bool {
        let cache = self.inner.rates.lock().await;
        cache
            .fresh(&pair.cache_key(), self.inner.cache_ttl)
            .is_some()
    }

    /// Waits for in-flight fetches, then releases the HTTP client.
    ///
    /// Dropping the service releases it as well; in-flight fetches keep it
    /// alive until they finish.
    pub async fn close(self) {
        let in_flight: Vec<PendingFetch> =
            self.inner.pending.lock().await.values().cloned().collect();
        if !in_flight.is_empty() {
            debug!("Waiting for {} in-flight fetches", in_flight.len());
            join_all(in_flight).await;
        }
        debug!("Exchange rate service closed");
    }
}

impl Inner {
    async fn fetch_and_store(self: Arc<Self>, pair: CurrencyPair) -> FetchOutcome {
        let key = pair.cache_key();

        let outcome = match self.fetch_one(&pair).await {
            Ok(rate) => self.store_rate(rate).await.map(|rate| RateQuote {
                rate,
                freshness: Freshness::Fetched,
            }),
            Err(e) => {
                error!(pair = %key, error = %e, "Failed to fetch exchange rate");
                let cached = self.rates.lock().await.entries.get(&key).cloned();
                match cached {
                    Some(rate) => {
                        warn!(
                            pair = %key,
                            fetched_at = %rate.timestamp(),
                            "Returning stale cached data"
                        );
                        Ok(RateQuote {
                            rate,
                            freshness: Freshness::Stale,
                        })
                    }
                    None => Err(e),
                }
            }
        };

        self.pending.lock().await.remove(&key);
        outcome
    }

    async fn fetch_one(&self, pair: &CurrencyPair) -> Result<ExchangeRate, ExchangeError> {
        self.limiter.acquire().await;
        self.provider.fetch_rate(pair).await
    }

    /// Updates memory first; a failed write still leaves the new rate cached.
    async fn store_rate(&self, rate: ExchangeRate) -> Result<ExchangeRate, ExchangeError> {
        let key = rate.cache_key();
        {
            let mut cache = self.rates.lock().await;
            cache.entries.insert(key.clone(), rate.clone());
            cache.touch();
        }

        let _guard = self.persist_lock.lock().await;
        match self.store.save_rate(&rate) {
            Ok(()) => {
                debug!(pair = %key, "Saved rate to cache");
                Ok(rate)
            }
            Err(e) => {
                error!(pair = %key, error = %e, "Failed to save to cache");
                Err(ExchangeError::Cache(format!(
                    "Failed to save rate to cache: {e}"
                )))
            }
        }
    }
}
