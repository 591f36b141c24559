//! TTL-capable key-value store abstraction and an in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use ratedesk_common::{DurationExt, Timestamp};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::FxError;

/// Errors reported by a key-value backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend reports that the key existed but its TTL has elapsed.
    #[error("key expired: {0}")]
    Expired(String),
}

impl From<StoreError> for FxError {
    fn from(e: StoreError) -> Self {
        FxError::StoreUnavailable(e.to_string())
    }
}

/// Minimal surface needed from a TTL-capable key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a live value. Expired keys read as `None` or `StoreError::Expired`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Overwrite a live key's value and TTL in one step. Returns `false`, writing
    /// nothing, if the key is missing or expired.
    async fn replace(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError>;

    /// Round-trip check.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Timestamp,
}

impl Entry {
    fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// Configuration for the in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Maximum number of entries, live or not yet reaped.
    pub max_entries: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self { max_entries: 100_000 }
    }
}

/// In-memory key-value store with lazy expiry and a background reaper.
///
/// Every read checks the absolute expiry, so callers never observe an expired
/// value even if the reaper has not run yet.
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    config: MemoryStoreConfig,
}

impl MemoryStore {
    /// Create a new store with default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    /// Create a new store with custom configuration.
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = ratedesk_common::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Periodically purge expired entries until `shutdown` flips to `true`.
    pub async fn run_reaper(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval.as_std().max(std::time::Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        debug!(removed, remaining = self.entries.len(), "Reaped expired entries");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Store reaper stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Get the number of stored entries, including not-yet-reaped ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let now = ratedesk_common::now();
        let total = self.entries.len();
        let live = self.entries.iter().filter(|e| e.is_live(now)).count();

        StoreStats {
            total_entries: total,
            live_entries: live,
            expired_entries: total.saturating_sub(live),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = ratedesk_common::now();
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }

        // Expired: reclaim it now rather than waiting for the reaper.
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        if ttl <= Duration::zero() {
            self.entries.remove(key);
            return Ok(());
        }

        if self.entries.len() >= self.config.max_entries && !self.entries.contains_key(key) {
            self.purge_expired();
            if self.entries.len() >= self.config.max_entries {
                return Err(StoreError::Unavailable(format!(
                    "capacity of {} entries reached",
                    self.config.max_entries
                )));
            }
        }

        let entry = Entry {
            value,
            expires_at: ratedesk_common::expires_in(ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn replace(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError> {
        let now = ratedesk_common::now();
        if ttl <= Duration::zero() {
            return Ok(self.entries.remove_if(key, |_, entry| entry.is_live(now)).is_some());
        }

        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.value = value;
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    async fn replace(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError> {
        (**self).replace(key, value, ttl).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }
}

/// Store statistics.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_entries: usize,
    pub live_entries: usize,
    pub expired_entries: usize,
}

/// Shared in-memory store.
pub type SharedMemoryStore = Arc<MemoryStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store.set("rate:SGD:PHP", "42.50".to_string(), Duration::seconds(30)).await.unwrap();

        assert_eq!(store.get("rate:SGD:PHP").await.unwrap().as_deref(), Some("42.50"));
        assert_eq!(store.get("rate:USD:PHP").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry_is_checked_on_read() {
        let store = MemoryStore::new();
        store.set("k", "v".to_string(), Duration::milliseconds(50)).await.unwrap();

        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(StdDuration::from_millis(60)).await;

        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_ttl_is_not_stored() {
        let store = MemoryStore::new();
        store.set("k", "v".to_string(), Duration::zero()).await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("k", "v".to_string(), Duration::seconds(30)).await.unwrap();

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_only_touches_live_keys() {
        let store = MemoryStore::new();
        store.set("k", "v1".to_string(), Duration::seconds(1)).await.unwrap();

        assert!(store.replace("k", "v2".to_string(), Duration::seconds(60)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        assert!(!store.replace("missing", "v".to_string(), Duration::seconds(60)).await.unwrap());
        assert!(store.get("missing").await.unwrap().is_none());

        assert!(store.replace("k", "v3".to_string(), Duration::zero()).await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.replace("k", "v4".to_string(), Duration::seconds(60)).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_replace_skips_expired_key() {
        let store = MemoryStore::new();
        store.set("k", "v".to_string(), Duration::milliseconds(10)).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        assert!(!store.replace("k", "v2".to_string(), Duration::seconds(60)).await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity() {
        let store = MemoryStore::with_config(MemoryStoreConfig { max_entries: 2 });
        store.set("a", "1".to_string(), Duration::seconds(30)).await.unwrap();
        store.set("b", "2".to_string(), Duration::seconds(30)).await.unwrap();

        assert!(matches!(
            store.set("c", "3".to_string(), Duration::seconds(30)).await,
            Err(StoreError::Unavailable(_))
        ));
        // Overwriting an existing key is always allowed.
        store.set("a", "10".to_string(), Duration::seconds(30)).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_and_stats() {
        let store = MemoryStore::new();
        store.set("short", "v".to_string(), Duration::milliseconds(20)).await.unwrap();
        store.set("long", "v".to_string(), Duration::seconds(30)).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(30)).await;

        let stats = store.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.live_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_reaper_loop() {
        let store = Arc::new(MemoryStore::new());
        store.set("k", "v".to_string(), Duration::milliseconds(10)).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reaper = {
            let store = store.clone();
            tokio::spawn(async move { store.run_reaper(Duration::milliseconds(5), shutdown_rx).await })
        };

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(store.len(), 0);

        shutdown_tx.send(true).unwrap();
        reaper.await.unwrap();
    }

    #[tokio::test]
    async fn test_shared_store_sees_same_entries() {
        let store: SharedMemoryStore = Arc::new(MemoryStore::new());
        let handle = store.clone();

        handle.set("k", "v".to_string(), Duration::seconds(30)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.len(), 1);
    }
}
