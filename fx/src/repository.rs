//! Rate cache and lock persistence over a key-value store.

use async_trait::async_trait;
use chrono::Duration;
use ratedesk_common::{CurrencyPair, RateLockId, Timestamp};
use tracing::debug;

use crate::error::{FxError, FxResult};
use crate::rate::Rate;
use crate::rate_lock::LockedRate;
use crate::store::{KeyValueStore, StoreError};

/// Storage for cached rates and locked rates.
#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Cache a rate for `ttl`.
    async fn save_rate(&self, rate: &Rate, ttl: Duration) -> FxResult<()>;

    /// Fetch a cached rate. `None` is a cache miss.
    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<Option<Rate>>;

    /// Persist a lock until its `expires_at`. Returns only once the write is accepted.
    async fn save_locked_rate(&self, locked: &LockedRate) -> FxResult<()>;

    /// Fetch a live lock. Missing and expired locks both read as `None`.
    async fn get_locked_rate(&self, lock_id: &RateLockId) -> FxResult<Option<LockedRate>>;

    /// Remove a lock. Removing an unknown lock succeeds.
    async fn delete_locked_rate(&self, lock_id: &RateLockId) -> FxResult<()>;

    /// Move a live lock's expiry. Returns `false` if the lock is gone.
    async fn extend_locked_rate(&self, lock_id: &RateLockId, new_expiry: Timestamp) -> FxResult<bool>;

    /// Check the backing store.
    async fn health(&self) -> FxResult<()>;
}

/// `RateRepository` storing JSON documents in any `KeyValueStore`.
pub struct KvRateRepository<S> {
    store: S,
}

impl<S: KeyValueStore> KvRateRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn rate_key(pair: &CurrencyPair) -> String {
        format!("rate:{}:{}", pair.source.code(), pair.target.code())
    }

    fn lock_key(lock_id: &RateLockId) -> String {
        format!("lock:{}", lock_id)
    }

    async fn get_live(&self, key: &str) -> FxResult<Option<String>> {
        match self.store.get(key).await {
            Ok(value) => Ok(value),
            Err(StoreError::Expired(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> RateRepository for KvRateRepository<S> {
    async fn save_rate(&self, rate: &Rate, ttl: Duration) -> FxResult<()> {
        let body = serde_json::to_string(rate)?;
        self.store.set(&Self::rate_key(&rate.pair), body, ttl).await?;
        Ok(())
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<Option<Rate>> {
        let Some(body) = self.get_live(&Self::rate_key(pair)).await? else {
            return Ok(None);
        };
        let rate: Rate = serde_json::from_str(&body)?;
        Ok(Some(rate))
    }

    async fn save_locked_rate(&self, locked: &LockedRate) -> FxResult<()> {
        let expires_at = locked
            .expires_at
            .ok_or_else(|| FxError::InvalidConfig(format!("lock {} has no expiry", locked.lock_id)))?;
        let ttl = expires_at - ratedesk_common::now();
        if ttl <= Duration::zero() {
            return Err(FxError::InvalidConfig(format!("lock {} is already expired", locked.lock_id)));
        }

        let body = serde_json::to_string(locked)?;
        self.store.set(&Self::lock_key(&locked.lock_id), body, ttl).await?;
        debug!(lock_id = %locked.lock_id, ttl_ms = ttl.num_milliseconds(), "Persisted locked rate");
        Ok(())
    }

    async fn get_locked_rate(&self, lock_id: &RateLockId) -> FxResult<Option<LockedRate>> {
        let Some(body) = self.get_live(&Self::lock_key(lock_id)).await? else {
            return Ok(None);
        };
        let locked: LockedRate = serde_json::from_str(&body)?;
        Ok(Some(locked))
    }

    async fn delete_locked_rate(&self, lock_id: &RateLockId) -> FxResult<()> {
        self.store.delete(&Self::lock_key(lock_id)).await?;
        Ok(())
    }

    async fn extend_locked_rate(&self, lock_id: &RateLockId, new_expiry: Timestamp) -> FxResult<bool> {
        let Some(mut locked) = self.get_locked_rate(lock_id).await? else {
            return Ok(false);
        };

        locked.expires_at = Some(new_expiry);
        let ttl = new_expiry - ratedesk_common::now();
        let body = serde_json::to_string(&locked)?;

        // A delete racing this call wins: replace never recreates a missing key.
        let extended = self.store.replace(&Self::lock_key(lock_id), body, ttl).await?;
        debug!(lock_id = %lock_id, extended, "Extended locked rate");
        Ok(extended)
    }

    async fn health(&self) -> FxResult<()> {
        self.store.ping().await?;
        Ok(())
    }
}
