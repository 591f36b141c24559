//! Rate locking for guaranteed pricing during a confirmation window.

use chrono::Duration;
use ratedesk_common::{constants, RateLockId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::rate::ExchangeRate;

/// A locked rate, or the expired marker for a lock that is gone.
///
/// Readers branch on `expired`; an expired lock carries only its id, whether
/// it lapsed naturally, was deleted, or never existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedRate {
    /// Opaque lock token.
    pub lock_id: RateLockId,
    /// The guaranteed rate.
    pub rate: Option<ExchangeRate>,
    /// When the lock was created.
    pub locked_at: Option<Timestamp>,
    /// When the lock stops being honoured.
    pub expires_at: Option<Timestamp>,
    pub expired: bool,
}

impl LockedRate {
    /// Create a new active lock with a fresh id.
    pub fn new(rate: ExchangeRate, duration: Duration) -> Self {
        let now = ratedesk_common::now();
        Self {
            lock_id: RateLockId::new(),
            rate: Some(rate),
            locked_at: Some(now),
            expires_at: Some(now + duration),
            expired: false,
        }
    }

    /// The outward form of a lock that no longer exists.
    pub fn expired(lock_id: RateLockId) -> Self {
        Self {
            lock_id,
            rate: None,
            locked_at: None,
            expires_at: None,
            expired: true,
        }
    }

    /// Check if the lock is still honoured.
    pub fn is_active(&self) -> bool {
        !self.expired
            && self
                .expires_at
                .map(|at| !ratedesk_common::is_expired(at))
                .unwrap_or(false)
    }

    /// Get remaining time until expiry.
    pub fn time_remaining(&self) -> Duration {
        match self.expires_at {
            Some(at) if !self.expired => {
                let remaining = at.signed_duration_since(ratedesk_common::now());
                remaining.max(Duration::zero())
            }
            _ => Duration::zero(),
        }
    }

    /// Lifespan granted at creation (or after extension).
    pub fn lifespan(&self) -> Option<Duration> {
        match (self.locked_at, self.expires_at) {
            (Some(from), Some(to)) => Some(to - from),
            _ => None,
        }
    }
}

/// Configuration for rate locks.
#[derive(Debug, Clone)]
pub struct RateLockConfig {
    /// Duration used when the caller does not ask for one.
    pub default_duration: Duration,
    /// Upper bound on any requested duration.
    pub max_duration: Duration,
    /// Upper bound on a single administrative extension.
    pub max_grace: Duration,
}

impl Default for RateLockConfig {
    fn default() -> Self {
        Self {
            default_duration: constants::default_lock_duration(),
            max_duration: constants::max_lock_duration(),
            max_grace: constants::max_lock_grace(),
        }
    }
}

impl RateLockConfig {
    /// Resolve a caller-requested duration in seconds.
    ///
    /// Non-positive requests get the default; anything above the maximum is
    /// cut down to it.
    pub fn clamp_duration(&self, requested_seconds: i64) -> Duration {
        if requested_seconds <= 0 {
            return self.default_duration;
        }
        if requested_seconds >= self.max_duration.num_seconds() {
            return self.max_duration;
        }
        Duration::seconds(requested_seconds)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_duration <= Duration::zero() {
            return Err("Default lock duration must be positive".to_string());
        }

        if self.default_duration > self.max_duration {
            return Err("Default lock duration cannot exceed max duration".to_string());
        }

        if self.max_grace < Duration::zero() {
            return Err("Lock grace cannot be negative".to_string());
        }

        Ok(())
    }
}
