//! Key-value storage abstractions used by the rate cache.

use async_trait::async_trait;
use std::sync::Arc;

/// A named bag of byte keys and values. Implementations swallow their own
/// storage errors; a failed read is a miss.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    async fn put(&self, key: &[u8], value: &[u8]);

    async fn remove(&self, key: &[u8]);

    async fn clear(&self);

    /// Replaces the whole collection with `entries` in one step. Readers
    /// observe either the old contents or the new ones, never a mix.
    async fn replace_all(&self, entries: Vec<(Vec<u8>, Vec<u8>)>);
}

pub trait Store: Send + Sync {
    /// Returns the collection called `name`, creating it on first use.
    /// `None` when a persistent collection was asked for but the backing
    /// store is unavailable.
    fn get_collection(&self, name: &str, persist: bool) -> Option<Arc<dyn KeyValueCollection>>;
}
