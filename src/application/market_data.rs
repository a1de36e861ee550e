use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::MarketDataConfig;
use crate::domain::errors::ProviderError;
use crate::domain::ports::MarketDataProvider;
use crate::domain::quote::{Candle, ChainRow, OptionQuote};

use super::cache::PerCycleCache;

/// Composes a primary provider with an ordered fallback list, routing every
/// read through a per-cycle cache.
pub struct MarketDataManager {
    primary: Arc<dyn MarketDataProvider>,
    fallback: Vec<Arc<dyn MarketDataProvider>>,
    fallback_enabled: bool,
    max_attempts: usize,
    cache: Mutex<PerCycleCache>,
}

impl MarketDataManager {
    pub fn new(
        primary: Arc<dyn MarketDataProvider>,
        fallback: Vec<Arc<dyn MarketDataProvider>>,
        config: &MarketDataConfig,
    ) -> Self {
        MarketDataManager {
            primary,
            fallback,
            fallback_enabled: config.fallback.enabled,
            max_attempts: config.fallback.max_attempts,
            cache: Mutex::new(PerCycleCache::new(config.cache.enabled, config.cache.max_items)),
        }
    }

    pub async fn start_new_cycle(&self) {
        self.cache.lock().await.start_new_cycle();
    }

    pub async fn cycle_id(&self) -> u64 {
        self.cache.lock().await.cycle_id()
    }

    async fn cached_or_fetch<T, F, Fut>(&self, key: String, fetch: F) -> Result<T, ProviderError>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone,
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        {
            let cache = self.cache.lock().await;
            if let Some(hit) = cache.get(&key) {
                if let Ok(value) = serde_json::from_value::<T>(hit.clone()) {
                    debug!(cache_key = %key, "market data cache hit");
                    return Ok(value);
                }
            }
        }

        match fetch(self.primary.clone()).await {
            Ok(value) => {
                self.store(&key, &value).await;
                return Ok(value);
            }
            Err(e) => {
                warn!(provider = self.primary.name(), error = %e, "primary provider failed");
            }
        }

        if self.fallback_enabled {
            for provider in self.fallback.iter().take(self.max_attempts) {
                match fetch(provider.clone()).await {
                    Ok(value) => {
                        self.store(&key, &value).await;
                        return Ok(value);
                    }
                    Err(e) => {
                        warn!(provider = provider.name(), error = %e, "fallback provider failed");
                    }
                }
            }
        }

        Err(ProviderError::Connection {
            provider: self.primary.name().to_string(),
            detail: "primary and all fallback providers exhausted".into(),
        })
    }

    async fn store<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.cache.lock().await.put(key.to_string(), v);
        }
    }

    pub async fn stock_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        let key = format!("stock_price:{symbol}");
        self.cached_or_fetch(key, |p| async move { p.stock_price(symbol).await }).await
    }

    pub async fn option_quote(&self, occ_symbol: &str) -> Result<OptionQuote, ProviderError> {
        let key = format!("option_quote:{occ_symbol}");
        let quote = self
            .cached_or_fetch(key, |p| async move { p.option_quote(occ_symbol).await })
            .await?;
        Ok(quote.with_computed_mid())
    }

    pub async fn option_chain(&self, symbol: &str, expiration: Option<NaiveDate>) -> Result<Vec<ChainRow>, ProviderError> {
        let key = format!("option_chain:{symbol}:{expiration:?}");
        self.cached_or_fetch(key, |p| async move { p.option_chain(symbol, expiration).await })
            .await
    }

    pub async fn option_expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>, ProviderError> {
        let key = format!("expirations:{symbol}");
        self.cached_or_fetch(key, |p| async move { p.option_expirations(symbol).await })
            .await
    }

    pub async fn historical_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ProviderError> {
        let key = format!("bars:{symbol}:{start}:{end}");
        self.cached_or_fetch(key, |p| async move { p.historical_bars(symbol, start, end).await })
            .await
    }

    /// Second-to-last daily close over the trailing week, per the manager's
    /// derived-field contract.
    pub async fn previous_close(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        let key = format!("previous_close:{symbol}");
        let symbol_owned = symbol.to_string();
        self.cached_or_fetch(key, move |p| {
            let symbol = symbol_owned.clone();
            async move {
                let end = Utc::now();
                let start = end - Duration::days(7);
                let bars = p.historical_bars(&symbol, start, end).await?;
                if bars.len() < 2 {
                    return Err(ProviderError::QuoteNotFound {
                        provider: p.name().to_string(),
                        symbol: symbol.clone(),
                    });
                }
                Ok(bars[bars.len() - 2].close)
            }
        })
        .await
    }

    /// A diagnostic record of cache health, independent of any specific key.
    pub async fn cache_occupancy(&self) -> usize {
        self.cache.lock().await.len()
    }
}

