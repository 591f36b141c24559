//! RateDesk FX Engine
//!
//! Quotes, caches and locks foreign exchange rates for cross-border payments.
//!
//! # Features
//!
//! - Simulated rate provider with direct, inverse and bridged derivation
//! - Bounded, seedable random drift around configured base rates
//! - Rate caching over a TTL key-value store, degrading to the provider on failure
//! - Rate locks with clamped durations, explicit deletion and extension
//! - Corridor-based quotes with percentage fees and fee floors
//! - Periodic rate streaming to subscribers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratedesk_fx::{
//!     CorridorRegistry, KvRateRepository, MemoryStore, RateService, RateServiceConfig,
//!     SimulatedProviderConfig, SimulatedRateProvider,
//! };
//! use ratedesk_common::Currency;
//!
//! let provider = Arc::new(SimulatedRateProvider::new(SimulatedProviderConfig::default())?);
//! let repository = Arc::new(KvRateRepository::new(MemoryStore::new()));
//! let service = RateService::new(
//!     provider,
//!     repository,
//!     CorridorRegistry::builtin()?,
//!     RateServiceConfig::default(),
//! );
//!
//! // Get current rate
//! let rate = service.get_rate(&Currency::sgd(), &Currency::php()).await?;
//!
//! // Lock it for a minute
//! let locked = service.lock_rate(&Currency::sgd(), &Currency::php(), 60).await?;
//! ```

pub mod corridor;
pub mod error;
pub mod provider;
pub mod rate;
pub mod rate_lock;
pub mod repository;
pub mod service;
pub mod simulated;
pub mod store;
pub mod stream;

pub use corridor::{Corridor, CorridorRegistry};
pub use error::{FxError, FxResult};
pub use provider::RateProvider;
pub use rate::{ExchangeRate, Quote, Rate};
pub use rate_lock::{LockedRate, RateLockConfig};
pub use repository::{KvRateRepository, RateRepository};
pub use service::{RateService, RateServiceConfig};
pub use simulated::{BaseRate, DriftConfig, SimulatedProviderConfig, SimulatedRateProvider};
pub use store::{KeyValueStore, MemoryStore, MemoryStoreConfig, StoreError};
pub use stream::RateStreamHandle;

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
