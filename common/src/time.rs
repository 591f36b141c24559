//! Time utilities and constants.

use chrono::{DateTime, Duration, Utc};

/// Timing defaults shared by the rate engine.
pub mod constants {
    use super::Duration;

    /// Default rate lock duration (30 seconds).
    pub fn default_lock_duration() -> Duration {
        Duration::seconds(30)
    }

    /// Maximum rate lock duration (120 seconds).
    pub fn max_lock_duration() -> Duration {
        Duration::seconds(120)
    }

    /// Maximum administrative extension of a live lock (60 seconds).
    pub fn max_lock_grace() -> Duration {
        Duration::seconds(60)
    }

    /// Rate cache TTL (30 seconds).
    pub fn rate_cache_ttl() -> Duration {
        Duration::seconds(30)
    }

    /// Interval between pushes on a rate subscription (5 seconds).
    pub fn stream_interval() -> Duration {
        Duration::seconds(5)
    }

    /// Deadline applied to each key-value store call (500 milliseconds).
    pub fn store_timeout() -> Duration {
        Duration::milliseconds(500)
    }
}

/// A timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check if a deadline has been reached.
pub fn is_expired(expiry: Timestamp) -> bool {
    now() >= expiry
}

/// Calculate expiry time from now.
pub fn expires_in(duration: Duration) -> Timestamp {
    now() + duration
}

/// Duration extensions for convenient conversion.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
