use crate::core::cache::KeyValueCollection;
use crate::core::clock::Clock;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const KEY_PREFIX: &str = "rate:";

/// A resolved rate (local units per unit of `currency_code`) and when it
/// was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct RateCacheEntry {
    pub currency_code: String,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
    pub as_of: Option<NaiveDate>,
}

/// On-disk record; the currency lives in the key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRate {
    rate: Decimal,
    /// Fetch time, milliseconds since the epoch.
    timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    as_of: Option<NaiveDate>,
}

fn cache_key(currency: &str) -> Vec<u8> {
    format!("{KEY_PREFIX}{}", currency.to_uppercase()).into_bytes()
}

/// Rate snapshot with a fixed time-to-live. Expiry is checked on read
/// against the stored fetch time; an expired entry is a miss.
pub struct RateCache {
    collection: Arc<dyn KeyValueCollection>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl RateCache {
    pub fn new(
        collection: Arc<dyn KeyValueCollection>,
        clock: Arc<dyn Clock>,
        ttl: std::time::Duration,
    ) -> Self {
        Self {
            collection,
            clock,
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    pub async fn get(&self, currency: &str) -> Option<RateCacheEntry> {
        let key = cache_key(currency);
        let raw = self.collection.get(&key).await?;
        let stored: StoredRate = match serde_json::from_slice(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                debug!(error = %e, "Dropping unreadable cache entry for {}", currency);
                self.collection.remove(&key).await;
                return None;
            }
        };

        let fetched_at = DateTime::from_timestamp_millis(stored.timestamp)?;
        let age = self.clock.now() - fetched_at;
        if age < Duration::zero() || age >= self.ttl {
            debug!(%age, "Cache entry expired or stamped in the future for {}", currency);
            self.collection.remove(&key).await;
            return None;
        }

        Some(RateCacheEntry {
            currency_code: currency.to_uppercase(),
            rate: stored.rate,
            fetched_at,
            as_of: stored.as_of,
        })
    }

    /// Swaps the whole snapshot for `entries`.
    pub async fn replace_snapshot(&self, entries: &[RateCacheEntry]) {
        let records = entries
            .iter()
            .filter_map(|entry| {
                let stored = StoredRate {
                    rate: entry.rate,
                    timestamp: entry.fetched_at.timestamp_millis(),
                    as_of: entry.as_of,
                };
                serde_json::to_vec(&stored)
                    .ok()
                    .map(|value| (cache_key(&entry.currency_code), value))
            })
            .collect();
        self.collection.replace_all(records).await;
    }

    pub async fn remove(&self, currency: &str) {
        self.collection.remove(&cache_key(currency)).await;
    }

    pub async fn clear(&self) {
        self.collection.clear().await;
    }
}
