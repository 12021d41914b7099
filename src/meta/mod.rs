//! Metadata store seam.
//!
//! The master records the node roster through a [`MetaStore`] handle and
//! subscribes to modifications of the roster key. The crate ships an
//! in-memory implementation for single-process clusters and tests; durable
//! backends are injected by deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{Error, Result};

#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Reads a key; `Ok(None)` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a key and notifies watchers of that key.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Subscribes to modifications of `key`. Each `put` on the key delivers
    /// one notification; receivers that lag simply observe fewer ticks.
    fn watch(&self, key: &str) -> broadcast::Receiver<()>;
}

/// Mutex-guarded map with broadcast modification notifications.
pub struct MemoryMeta {
    data: Mutex<HashMap<String, String>>,
    watchers: Mutex<HashMap<String, broadcast::Sender<()>>>,
}

impl MemoryMeta {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, key: &str) -> broadcast::Sender<()> {
        let mut watchers = self.watchers.lock().expect("meta watchers lock");
        watchers
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(16).0)
            .clone()
    }
}

impl Default for MemoryMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetaStore for MemoryMeta {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self
            .data
            .lock()
            .map_err(|_| Error::Persistence("meta store poisoned".to_string()))?;
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut data = self
                .data
                .lock()
                .map_err(|_| Error::Persistence("meta store poisoned".to_string()))?;
            data.insert(key.to_string(), value.to_string());
        }
        // No receivers is fine; the send result is irrelevant.
        let _ = self.sender_for(key).send(());
        Ok(())
    }

    fn watch(&self, key: &str) -> broadcast::Receiver<()> {
        self.sender_for(key).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_absent_key_is_none() {
        let meta = MemoryMeta::new();
        assert_eq!(meta.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let meta = MemoryMeta::new();
        meta.put("k", "v").await.unwrap();
        assert_eq!(meta.get("k").await.unwrap(), Some("v".to_string()));

        meta.put("k", "v2").await.unwrap();
        assert_eq!(meta.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn watch_sees_modifications() {
        let meta = MemoryMeta::new();
        let mut rx = meta.watch("k");

        meta.put("k", "v").await.unwrap();
        rx.recv().await.expect("one notification");

        // A write to a different key does not tick this watcher.
        meta.put("other", "v").await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
