pub mod disk;
pub mod memory;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::{debug, warn};

/// A thread-safe key-value store that can hold multiple collections.
pub struct KeyValueStore {
    collections: RwLock<HashMap<(String, bool), Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    /// Opens a store. Persistent collections are only available when
    /// `cache_dir` is given and the keyspace there can be opened.
    pub fn new(cache_dir: Option<&Path>) -> Self {
        let keyspace = cache_dir.and_then(|dir| match fjall::Config::new(dir).open() {
            Ok(keyspace) => {
                debug!("Opened cache keyspace at {}", dir.display());
                Some(keyspace)
            }
            Err(e) => {
                warn!(error = %e, "Could not open cache at {}", dir.display());
                None
            }
        });

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }
}

impl Default for KeyValueStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store for KeyValueStore {
    fn get_collection(&self, name: &str, persist: bool) -> Option<Arc<dyn KeyValueCollection>> {
        let key = (name.to_string(), persist);
        if let Some(collection) = self.collections.read().ok()?.get(&key) {
            return Some(Arc::clone(collection));
        }

        let new_collection: Arc<dyn KeyValueCollection> = if persist {
            let keyspace = self.keyspace.as_ref()?;
            let partition = keyspace
                .open_partition(name, PartitionCreateOptions::default())
                .ok()?;
            Arc::new(DiskCollection::new(keyspace.clone(), partition))
        } else {
            Arc::new(MemoryCollection::new())
        };

        let mut collections = self.collections.write().ok()?;
        Some(Arc::clone(collections.entry(key).or_insert(new_collection)))
    }
}
