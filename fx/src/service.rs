//! Rate service: orchestrates provider, repository and corridor registry.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use ratedesk_common::{constants, Currency, CurrencyPair, DurationExt, Money, QuoteId, RateLockId};
use rust_decimal::Decimal;
use tracing::{debug, error, info, instrument, warn};

use crate::corridor::{Corridor, CorridorRegistry};
use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;
use crate::rate::{ExchangeRate, Quote, Rate};
use crate::rate_lock::{LockedRate, RateLockConfig};
use crate::repository::RateRepository;

/// Configuration for the rate service.
#[derive(Debug, Clone)]
pub struct RateServiceConfig {
    /// How long fetched rates stay in the cache.
    pub rate_cache_ttl: Duration,
    /// Margin (percent) for pairs without a corridor.
    pub default_margin_percent: Decimal,
    /// Deadline for each repository call.
    pub store_timeout: Duration,
    /// Default push interval for rate subscriptions.
    pub stream_interval: Duration,
    /// Rate lock configuration.
    pub lock: RateLockConfig,
}

impl Default for RateServiceConfig {
    fn default() -> Self {
        Self {
            rate_cache_ttl: constants::rate_cache_ttl(),
            default_margin_percent: Decimal::new(3, 1), // 0.3%
            store_timeout: constants::store_timeout(),
            stream_interval: constants::stream_interval(),
            lock: RateLockConfig::default(),
        }
    }
}

impl RateServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_parse::<i64>("RATE_CACHE_TTL_SECS") {
            config.rate_cache_ttl = Duration::seconds(secs);
        }

        if let Some(secs) = env_parse::<i64>("RATE_LOCK_DEFAULT_SECS") {
            config.lock.default_duration = Duration::seconds(secs);
        }

        if let Some(secs) = env_parse::<i64>("RATE_LOCK_MAX_SECS") {
            config.lock.max_duration = Duration::seconds(secs);
        }

        if let Some(ms) = env_parse::<i64>("STORE_TIMEOUT_MS") {
            config.store_timeout = Duration::milliseconds(ms);
        }

        if let Some(margin) = env_parse::<Decimal>("DEFAULT_MARGIN_PERCENT") {
            config.default_margin_percent = margin;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_cache_ttl <= Duration::zero() {
            return Err("Rate cache TTL must be positive".to_string());
        }

        if self.default_margin_percent < Decimal::ZERO
            || self.default_margin_percent >= Decimal::ONE_HUNDRED
        {
            return Err("Default margin must be in [0, 100) percent".to_string());
        }

        if self.store_timeout <= Duration::zero() {
            return Err("Store timeout must be positive".to_string());
        }

        if self.stream_interval <= Duration::zero() {
            return Err("Stream interval must be positive".to_string());
        }

        self.lock.validate()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// The rate quoting, caching and locking service.
pub struct RateService {
    provider: Arc<dyn RateProvider>,
    repository: Arc<dyn RateRepository>,
    corridors: CorridorRegistry,
    config: RateServiceConfig,
}

impl RateService {
    /// Create a new service from its collaborators.
    pub fn new(
        provider: Arc<dyn RateProvider>,
        repository: Arc<dyn RateRepository>,
        corridors: CorridorRegistry,
        config: RateServiceConfig,
    ) -> Self {
        Self {
            provider,
            repository,
            corridors,
            config,
        }
    }

    pub fn config(&self) -> &RateServiceConfig {
        &self.config
    }

    /// Get the customer-facing rate for a pair.
    #[instrument(skip(self), fields(pair = %format!("{source}/{target}")))]
    pub async fn get_rate(&self, source: &Currency, target: &Currency) -> FxResult<ExchangeRate> {
        let pair = CurrencyPair::new(source.clone(), target.clone());
        let rate = self.fetch_rate(&pair).await?;
        Ok(self.apply_margin(rate))
    }

    /// Get rates for several pairs. Pairs that cannot be priced are left out.
    #[instrument(skip(self, pairs), fields(count = pairs.len()))]
    pub async fn get_rates(&self, pairs: &[CurrencyPair]) -> Vec<ExchangeRate> {
        let mut found: HashMap<CurrencyPair, Rate> = HashMap::with_capacity(pairs.len());
        let mut misses = Vec::new();
        let mut seen = HashSet::new();

        for pair in pairs {
            if !seen.insert(pair.clone()) {
                continue;
            }
            match self.cached_rate(pair).await {
                Some(rate) => {
                    found.insert(pair.clone(), rate);
                }
                None => misses.push(pair.clone()),
            }
        }

        if !misses.is_empty() {
            let fetched = self.provider.get_rates(&misses).await;
            debug!(misses = misses.len(), fetched = fetched.len(), "Fetched batch from provider");
            for rate in fetched {
                self.cache_rate(&rate).await;
                found.insert(rate.pair.clone(), rate);
            }
        }

        pairs
            .iter()
            .filter_map(|pair| found.get(pair).cloned())
            .map(|rate| self.apply_margin(rate))
            .collect()
    }

    /// Lock the current rate for a pair.
    ///
    /// `requested_seconds <= 0` selects the default duration; longer requests
    /// are capped at the configured maximum. Every call creates a new lock.
    #[instrument(skip(self), fields(pair = %format!("{source}/{target}")))]
    pub async fn lock_rate(
        &self,
        source: &Currency,
        target: &Currency,
        requested_seconds: i64,
    ) -> FxResult<LockedRate> {
        let duration = self.config.lock.clamp_duration(requested_seconds);
        let rate = self.get_rate(source, target).await?;
        let locked = LockedRate::new(rate, duration);

        self.with_deadline("save_locked_rate", self.repository.save_locked_rate(&locked))
            .await
            .map_err(|e| {
                error!(lock_id = %locked.lock_id, error = %e, "Failed to persist rate lock");
                e
            })?;

        info!(
            lock_id = %locked.lock_id,
            duration_secs = duration.num_seconds(),
            "Created rate lock"
        );

        Ok(locked)
    }

    /// Look up a lock. Unknown, deleted and lapsed locks come back with `expired: true`.
    #[instrument(skip(self))]
    pub async fn get_locked_rate(&self, lock_id: &str) -> FxResult<LockedRate> {
        let id = RateLockId::from(lock_id);

        match self
            .with_deadline("get_locked_rate", self.repository.get_locked_rate(&id))
            .await
        {
            Ok(Some(locked)) if locked.is_active() => Ok(locked),
            Ok(_) => {
                debug!(lock_id = %id, "Rate lock expired or unknown");
                Ok(LockedRate::expired(id))
            }
            Err(FxError::Serialization(e)) => {
                warn!(lock_id = %id, error = %e, "Unreadable rate lock treated as expired");
                Ok(LockedRate::expired(id))
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a lock. Deleting an unknown lock succeeds.
    #[instrument(skip(self))]
    pub async fn delete_locked_rate(&self, lock_id: &str) -> FxResult<()> {
        let id = RateLockId::from(lock_id);
        self.with_deadline("delete_locked_rate", self.repository.delete_locked_rate(&id))
            .await?;
        info!(lock_id = %id, "Rate lock deleted");
        Ok(())
    }

    /// Push a live lock's expiry out by `grace`, capped at the configured maximum grace.
    #[instrument(skip(self))]
    pub async fn extend_locked_rate(&self, lock_id: &str, grace: Duration) -> FxResult<LockedRate> {
        let mut locked = self.get_locked_rate(lock_id).await?;
        let grace = grace.min(self.config.lock.max_grace);
        let Some(expires_at) = locked.expires_at.filter(|_| !locked.expired) else {
            return Ok(locked);
        };
        if grace <= Duration::zero() {
            return Ok(locked);
        }

        let new_expiry = expires_at + grace;
        let extended = self
            .with_deadline(
                "extend_locked_rate",
                self.repository.extend_locked_rate(&locked.lock_id, new_expiry),
            )
            .await?;

        if !extended {
            return Ok(LockedRate::expired(locked.lock_id));
        }

        info!(lock_id = %locked.lock_id, grace_secs = grace.num_seconds(), "Rate lock extended");
        locked.expires_at = Some(new_expiry);
        Ok(locked)
    }

    /// Price a transfer of `source_amount` over a configured corridor.
    #[instrument(skip(self), fields(pair = %format!("{source}/{target}")))]
    pub async fn get_quote(
        &self,
        source: &Currency,
        target: &Currency,
        source_amount: Decimal,
    ) -> FxResult<Quote> {
        if source_amount <= Decimal::ZERO {
            return Err(FxError::InvalidAmount(format!(
                "source amount must be positive, got {source_amount}"
            )));
        }

        let pair = CurrencyPair::new(source.clone(), target.clone());
        let corridor = self
            .corridors
            .find(&pair)
            .ok_or_else(|| FxError::CorridorNotFound(pair.clone()))?;
        if !corridor.enabled {
            return Err(FxError::CorridorDisabled(pair));
        }

        let rate = self.get_rate(source, target).await?;

        let too_large =
            || FxError::InvalidAmount(format!("source amount {source_amount} is too large to price"));

        let amount = Money::new(source_amount, source.clone());
        let fee = amount
            .checked_mul(corridor.fee_percentage / Decimal::ONE_HUNDRED)
            .ok_or_else(too_large)?
            .max(corridor.fee_minimum.clone())?
            .round();
        let target_amount = Money::new(source_amount, target.clone())
            .checked_mul(rate.buy_rate)
            .ok_or_else(too_large)?
            .round();
        let total_cost = amount.checked_add(&fee)?.ok_or_else(too_large)?;

        let quote = Quote {
            quote_id: QuoteId::new(),
            source_currency: source.clone(),
            target_currency: target.clone(),
            source_amount: amount,
            target_amount,
            exchange_rate: rate.buy_rate,
            mid_market_rate: rate.mid(),
            fee,
            total_cost,
            valid_until: rate.valid_until(),
        };

        debug!(quote_id = %quote.quote_id, fee = %quote.fee, "Quote computed");
        Ok(quote)
    }

    /// List corridors, optionally for one source currency.
    pub fn get_corridors(&self, source: Option<&Currency>) -> Vec<Corridor> {
        self.corridors.list(source)
    }

    /// Check the backing store.
    pub async fn health(&self) -> FxResult<()> {
        self.with_deadline("health", self.repository.health()).await
    }

    /// Cache first, provider on miss, write-through on fetch.
    async fn fetch_rate(&self, pair: &CurrencyPair) -> FxResult<Rate> {
        if let Some(rate) = self.cached_rate(pair).await {
            return Ok(rate);
        }

        let rate = self.provider.get_rate(pair).await?;
        self.cache_rate(&rate).await;
        Ok(rate)
    }

    async fn cached_rate(&self, pair: &CurrencyPair) -> Option<Rate> {
        match self.with_deadline("get_rate", self.repository.get_rate(pair)).await {
            Ok(Some(rate)) if rate.is_valid() => {
                debug!(pair = %pair, "Cache hit");
                Some(rate)
            }
            Ok(_) => {
                debug!(pair = %pair, "Cache miss");
                None
            }
            Err(e) => {
                warn!(pair = %pair, error = %e, "Rate cache read failed, falling back to provider");
                None
            }
        }
    }

    async fn cache_rate(&self, rate: &Rate) {
        let ttl = self.config.rate_cache_ttl;
        if let Err(e) = self
            .with_deadline("save_rate", self.repository.save_rate(rate, ttl))
            .await
        {
            warn!(pair = %rate.pair, error = %e, "Rate cache write failed");
        }
    }

    fn margin_for(&self, pair: &CurrencyPair) -> Decimal {
        self.corridors
            .find(pair)
            .map(|c| c.margin_percentage)
            .unwrap_or(self.config.default_margin_percent)
    }

    fn apply_margin(&self, rate: Rate) -> ExchangeRate {
        let margin = self.margin_for(&rate.pair);
        ExchangeRate::with_margin(rate, margin)
    }

    async fn with_deadline<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = FxResult<T>>,
    ) -> FxResult<T> {
        match tokio::time::timeout(self.config.store_timeout.as_std(), fut).await {
            Ok(result) => result,
            Err(_) => Err(FxError::Timeout(format!(
                "{operation} exceeded {}ms",
                self.config.store_timeout.num_milliseconds()
            ))),
        }
    }
}
