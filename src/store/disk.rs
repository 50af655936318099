use crate::core::cache::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use std::collections::HashSet;
use tracing::debug;

/// Collection backed by a fjall partition, survives restarts.
pub struct DiskCollection {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Keyspace, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }

    fn existing_keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        for key in self.partition.keys() {
            keys.push(key?.to_vec());
        }
        Ok(keys)
    }

    fn sync(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.partition.get(key) {
            Ok(Some(value)) => {
                debug!("Cache HIT for key: {}", String::from_utf8_lossy(key));
                Some(value.to_vec())
            }
            Ok(None) => {
                debug!("Cache MISS for key: {}", String::from_utf8_lossy(key));
                None
            }
            Err(e) => {
                debug!("DiskCollection get error: {}", e);
                None
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8]) {
        let res: Result<()> = (|| {
            self.partition.insert(key, value)?;
            self.sync()
        })();
        match res {
            Ok(()) => debug!("Cache PUT for key: {}", String::from_utf8_lossy(key)),
            Err(e) => debug!("DiskCollection put error: {}", e),
        }
    }

    async fn remove(&self, key: &[u8]) {
        let res: Result<()> = (|| {
            self.partition.remove(key)?;
            self.sync()
        })();
        if let Err(e) = res {
            debug!("DiskCollection remove error: {}", e);
        }
    }

    async fn clear(&self) {
        let res: Result<()> = (|| {
            let mut batch = self.keyspace.batch();
            for key in self.existing_keys()? {
                batch.remove(&self.partition, key);
            }
            batch.commit()?;
            self.sync()
        })();
        match res {
            Ok(()) => debug!("Cache CLEAR"),
            Err(e) => debug!("DiskCollection clear error: {}", e),
        }
    }

    async fn replace_all(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) {
        let res: Result<()> = (|| {
            let incoming: HashSet<&[u8]> = entries.iter().map(|(k, _)| k.as_slice()).collect();
            let mut batch = self.keyspace.batch();
            // A key is either removed or written in one batch, never both.
            for key in self.existing_keys()? {
                if !incoming.contains(key.as_slice()) {
                    batch.remove(&self.partition, key);
                }
            }
            for (key, value) in &entries {
                batch.insert(&self.partition, key.as_slice(), value.as_slice());
            }
            batch.commit()?;
            self.sync()
        })();
        match res {
            Ok(()) => debug!(entries = entries.len(), "Cache REPLACE"),
            Err(e) => debug!("DiskCollection replace error: {}", e),
        }
    }
}
