//! Layered exchange rate lookup: cache, then each remote source in order,
//! then the built-in defaults.

use super::defaults::DefaultRates;
use super::exchange_rate_api::ExchangeRateApiSource;
use super::exchange_rate_host::ExchangeRateHostSource;
use super::rate_cache::{RateCache, RateCacheEntry};
use crate::core::cache::Store;
use crate::core::clock::Clock;
use crate::core::config::AppConfig;
use crate::core::currency::{CurrencyRateProvider, RateOrigin, RateQuote, RateSource, RateTable};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const RATE_COLLECTION: &str = "exchange_rates";

pub struct ExchangeRateProvider {
    local_currency: String,
    sources: Vec<Box<dyn RateSource>>,
    cache: RateCache,
    defaults: DefaultRates,
    clock: Arc<dyn Clock>,
}

impl ExchangeRateProvider {
    pub fn new(
        local_currency: &str,
        sources: Vec<Box<dyn RateSource>>,
        cache: RateCache,
        defaults: DefaultRates,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            local_currency: local_currency.to_uppercase(),
            sources,
            cache,
            defaults,
            clock,
        }
    }

    /// Wires up the configured sources and cache. Falls back to an in-memory
    /// cache when a persistent one was requested but cannot be opened.
    pub fn from_config(config: &AppConfig, store: &dyn Store, clock: Arc<dyn Clock>) -> Result<Self> {
        let timeout = config.providers.timeout();
        let mut sources: Vec<Box<dyn RateSource>> = Vec::new();
        if let Some(primary) = &config.providers.primary {
            sources.push(Box::new(ExchangeRateApiSource::new(
                &primary.base_url,
                timeout,
            )?));
        }
        if let Some(secondary) = &config.providers.secondary {
            sources.push(Box::new(ExchangeRateHostSource::new(
                &secondary.base_url,
                timeout,
            )?));
        }

        let collection = match store.get_collection(RATE_COLLECTION, config.cache.persist) {
            Some(collection) => collection,
            None => {
                warn!("Persistent rate cache unavailable, using in-memory cache");
                store
                    .get_collection(RATE_COLLECTION, false)
                    .ok_or_else(|| anyhow!("Failed to create rate cache"))?
            }
        };
        let cache = RateCache::new(collection, Arc::clone(&clock), config.cache.ttl());
        let defaults = DefaultRates::builtin().with_overrides(&config.default_rates);

        Ok(Self::new(
            &config.local_currency,
            sources,
            cache,
            defaults,
            clock,
        ))
    }

    pub fn local_currency(&self) -> &str {
        &self.local_currency
    }

    /// Codes to ask partial-table sources for: the requested one first, then
    /// every currency the defaults know about.
    fn symbols_for(&self, currency: &str) -> Vec<String> {
        let mut symbols = vec![currency.to_string()];
        symbols.extend(
            self.defaults
                .currencies()
                .into_iter()
                .filter(|code| code != currency && *code != self.local_currency),
        );
        symbols
    }

    async fn try_source(&self, source: &dyn RateSource, currency: &str) -> Result<RateQuote> {
        let symbols = self.symbols_for(currency);
        let table = source.fetch_table(&self.local_currency, &symbols).await?;

        let quoted = table
            .rates
            .get(currency)
            .copied()
            .ok_or_else(|| anyhow!("No rate for {} in {} table", currency, source.name()))?;
        let rate = invert(quoted)
            .ok_or_else(|| anyhow!("Unusable rate for {}: {}", currency, quoted))?;
        let as_of = table.as_of.unwrap_or_else(|| self.clock.today());

        self.cache
            .replace_snapshot(&self.snapshot_entries(&table, as_of))
            .await;

        Ok(RateQuote {
            rate,
            as_of: Some(as_of),
            origin: RateOrigin::Remote(source.name().to_string()),
        })
    }

    fn snapshot_entries(&self, table: &RateTable, as_of: chrono::NaiveDate) -> Vec<RateCacheEntry> {
        let fetched_at = self.clock.now();
        table
            .rates
            .iter()
            .filter(|(code, _)| **code != self.local_currency)
            .filter_map(|(code, quoted)| {
                invert(*quoted).map(|rate| RateCacheEntry {
                    currency_code: code.clone(),
                    rate,
                    fetched_at,
                    as_of: Some(as_of),
                })
            })
            .collect()
    }
}

/// Tables quote local→foreign; callers want foreign→local.
fn invert(quoted: Decimal) -> Option<Decimal> {
    if quoted <= Decimal::ZERO {
        return None;
    }
    Decimal::ONE.checked_div(quoted)
}

#[async_trait]
impl CurrencyRateProvider for ExchangeRateProvider {
    #[instrument(name = "GetRate", skip(self), fields(local = %self.local_currency))]
    async fn get_rate(&self, currency: &str, force_refresh: bool) -> RateQuote {
        let currency = currency.trim().to_uppercase();
        if currency == self.local_currency {
            return RateQuote {
                rate: Decimal::ONE,
                as_of: Some(self.clock.today()),
                origin: RateOrigin::Local,
            };
        }

        if !force_refresh {
            if let Some(entry) = self.cache.get(&currency).await {
                debug!(rate = %entry.rate, "Using cached rate for {}", currency);
                return RateQuote {
                    rate: entry.rate,
                    as_of: entry.as_of,
                    origin: RateOrigin::Cache,
                };
            }
        }

        for source in &self.sources {
            match self.try_source(source.as_ref(), &currency).await {
                Ok(quote) => {
                    info!(rate = %quote.rate, source = source.name(), "Fetched rate for {}", currency);
                    return quote;
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Rate source failed for {}", currency);
                }
            }
        }

        // A default answer leaves no cached rates behind.
        self.cache.clear().await;
        let rate = self.defaults.rate_for(&currency);
        warn!(rate = %rate, "All rate sources failed, using default for {}", currency);
        RateQuote {
            rate,
            as_of: None,
            origin: RateOrigin::Default,
        }
    }

    async fn clear_cache(&self, currency: Option<&str>) {
        match currency {
            Some(code) => self.cache.remove(code.trim()).await,
            None => self.cache.clear().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::KeyValueCollection;
    use crate::core::clock::ManualClock;
    use crate::store::memory::MemoryCollection;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockSource {
        name: &'static str,
        table: Option<HashMap<String, Decimal>>,
        as_of: Option<NaiveDate>,
        call_count: Arc<AtomicUsize>,
    }

    impl MockSource {
        fn ok(name: &'static str, rates: &[(&str, Decimal)]) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let table = rates
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect();
            let source = Self {
                name,
                table: Some(table),
                as_of: NaiveDate::from_ymd_opt(2025, 1, 1),
                call_count: Arc::clone(&calls),
            };
            (source, calls)
        }

        fn failing(name: &'static str) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let source = Self {
                name,
                table: None,
                as_of: None,
                call_count: Arc::clone(&calls),
            };
            (source, calls)
        }
    }

    #[async_trait]
    impl RateSource for MockSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_table(&self, base: &str, _symbols: &[String]) -> Result<RateTable> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match &self.table {
                Some(rates) => Ok(RateTable {
                    base: base.to_string(),
                    rates: rates.clone(),
                    as_of: self.as_of,
                }),
                None => Err(anyhow!("{} is down", self.name)),
            }
        }
    }

    fn provider(
        sources: Vec<Box<dyn RateSource>>,
    ) -> (ExchangeRateProvider, Arc<ManualClock>, Arc<MemoryCollection>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap(),
        ));
        let collection = Arc::new(MemoryCollection::new());
        let cache = RateCache::new(
            collection.clone(),
            clock.clone(),
            std::time::Duration::from_secs(3600),
        );
        let provider = ExchangeRateProvider::new(
            "CNY",
            sources,
            cache,
            DefaultRates::builtin(),
            clock.clone(),
        );
        (provider, clock, collection)
    }

    #[tokio::test]
    async fn test_local_currency_bypasses_everything() {
        let (primary, calls) = MockSource::failing("primary");
        let (provider, _, _) = provider(vec![Box::new(primary)]);

        let quote = provider.get_rate("cny", true).await;
        assert_eq!(quote.rate, Decimal::ONE);
        assert_eq!(quote.as_of, NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(quote.origin, RateOrigin::Local);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_primary_rate_is_inverted_and_cached() {
        let (primary, calls) = MockSource::ok("primary", &[("USD", dec!(0.125)), ("EUR", dec!(0.1))]);
        let (provider, _, _) = provider(vec![Box::new(primary)]);

        let first = provider.get_rate("USD", false).await;
        assert_eq!(first.rate, dec!(8));
        assert_eq!(first.as_of, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(first.origin, RateOrigin::Remote("primary".to_string()));

        let second = provider.get_rate("USD", false).await;
        assert_eq!(second.rate, first.rate);
        assert_eq!(second.origin, RateOrigin::Cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The rest of the table came along with the first fetch.
        let eur = provider.get_rate("EUR", false).await;
        assert_eq!(eur.rate, dec!(10));
        assert_eq!(eur.origin, RateOrigin::Cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_skips_cache() {
        let (primary, calls) = MockSource::ok("primary", &[("USD", dec!(0.125))]);
        let (provider, _, _) = provider(vec![Box::new(primary)]);

        provider.get_rate("USD", false).await;
        let refreshed = provider.get_rate("USD", true).await;
        assert_eq!(refreshed.origin, RateOrigin::Remote("primary".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let (primary, calls) = MockSource::ok("primary", &[("USD", dec!(0.125))]);
        let (provider, clock, _) = provider(vec![Box::new(primary)]);

        provider.get_rate("USD", false).await;
        clock.advance(Duration::minutes(61));
        let quote = provider.get_rate("USD", false).await;
        assert_eq!(quote.origin, RateOrigin::Remote("primary".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_secondary_used_when_primary_fails() {
        let (primary, primary_calls) = MockSource::failing("primary");
        let (mut secondary, secondary_calls) = MockSource::ok("secondary", &[("USD", dec!(0.25))]);
        secondary.as_of = None;
        let (provider, _, _) = provider(vec![Box::new(primary), Box::new(secondary)]);

        let quote = provider.get_rate("USD", false).await;
        assert_eq!(quote.rate, dec!(4));
        // No date from the source: today's date from the clock.
        assert_eq!(quote.as_of, NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(quote.origin, RateOrigin::Remote("secondary".to_string()));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_entry_falls_through() {
        let (primary, _) = MockSource::ok("primary", &[("EUR", dec!(0.1))]);
        let (secondary, _) = MockSource::ok("secondary", &[("GBP", dec!(0.5)), ("EUR", dec!(0.2))]);
        let (provider, _, collection) = provider(vec![Box::new(primary), Box::new(secondary)]);

        let quote = provider.get_rate("GBP", false).await;
        assert_eq!(quote.rate, dec!(2));
        assert_eq!(quote.origin, RateOrigin::Remote("secondary".to_string()));
        // The failed primary table never reached the cache.
        let eur = collection.get(b"rate:EUR").await.unwrap();
        let eur: serde_json::Value = serde_json::from_slice(&eur).unwrap();
        let eur_rate: Decimal = eur["rate"].as_str().unwrap().parse().unwrap();
        assert_eq!(eur_rate, dec!(5));
    }

    #[tokio::test]
    async fn test_non_positive_quote_falls_through() {
        let (primary, _) = MockSource::ok("primary", &[("USD", dec!(0))]);
        let (provider, _, _) = provider(vec![Box::new(primary)]);

        let quote = provider.get_rate("USD", false).await;
        assert_eq!(quote.origin, RateOrigin::Default);
    }

    #[tokio::test]
    async fn test_all_sources_down_uses_default_and_clears_cache() {
        let (primary, _) = MockSource::failing("primary");
        let (secondary, _) = MockSource::failing("secondary");
        let (provider, clock, collection) =
            provider(vec![Box::new(primary), Box::new(secondary)]);
        provider
            .cache
            .replace_snapshot(&[RateCacheEntry {
                currency_code: "EUR".to_string(),
                rate: dec!(7.9),
                fetched_at: clock.now(),
                as_of: None,
            }])
            .await;

        let quote = provider.get_rate("USD", false).await;
        assert_eq!(quote.rate, dec!(7.2));
        assert!(quote.as_of.is_none());
        assert_eq!(quote.origin, RateOrigin::Default);
        assert!(collection.get(b"rate:EUR").await.is_none());

        let unknown = provider.get_rate("XYZ", false).await;
        assert_eq!(unknown.rate, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_clear_cache_single_and_all() {
        let (primary, calls) = MockSource::ok("primary", &[("USD", dec!(0.125)), ("EUR", dec!(0.1))]);
        let (provider, _, _) = provider(vec![Box::new(primary)]);

        provider.get_rate("USD", false).await;
        provider.clear_cache(Some("usd")).await;
        assert_eq!(
            provider.get_rate("EUR", false).await.origin,
            RateOrigin::Cache
        );
        provider.get_rate("USD", false).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        provider.clear_cache(None).await;
        provider.get_rate("EUR", false).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_symbols_put_requested_code_first() {
        let (provider, _, _) = provider(Vec::new());
        let symbols = provider.symbols_for("GBP");
        assert_eq!(symbols, vec!["GBP", "EUR", "HKD", "JPY", "USD"]);
    }
}
