//! Simulated market-data provider with inverse/bridge derivation and drift.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ratedesk_common::{Currency, CurrencyPair, Timestamp};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;
use crate::rate::Rate;

/// A configured base mid-rate.
#[derive(Debug, Clone)]
pub struct BaseRate {
    pub pair: CurrencyPair,
    pub mid: Decimal,
    /// Full spread in percent; `None` uses the provider default.
    pub spread_percent: Option<Decimal>,
}

impl BaseRate {
    pub fn new(source: &str, target: &str, mid: Decimal) -> Self {
        Self {
            pair: CurrencyPair::new(source, target),
            mid,
            spread_percent: None,
        }
    }

    pub fn with_spread(mut self, spread_percent: Decimal) -> Self {
        self.spread_percent = Some(spread_percent);
        self
    }
}

/// Random-walk drift settings.
#[derive(Debug, Clone)]
pub struct DriftConfig {
    /// Whether the random walk advances at all. Explicit offsets apply regardless.
    pub enabled: bool,
    /// Minimum time between two steps of a pair's walk.
    pub update_interval: Duration,
    /// Largest single step, as a fraction of the base rate.
    pub max_step: Decimal,
    /// Bound on the accumulated offset, as a fraction of the base rate.
    pub max_offset: Decimal,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_interval: Duration::seconds(10),
            max_step: Decimal::new(5, 4),   // 0.05%
            max_offset: Decimal::new(2, 2), // 2%
        }
    }
}

/// Configuration for the simulated provider.
#[derive(Debug, Clone)]
pub struct SimulatedProviderConfig {
    pub name: String,
    pub base_rates: Vec<BaseRate>,
    /// Spread used when a pair has none configured, in percent.
    pub default_spread_percent: Decimal,
    /// Candidate bridge currencies, tried in order.
    pub bridge_currencies: Vec<Currency>,
    pub allow_inversion: bool,
    /// How long a produced rate stays quotable.
    pub quote_validity: Duration,
    pub drift: DriftConfig,
    /// Fixed seed for reproducible drift.
    pub seed: Option<u64>,
}

impl Default for SimulatedProviderConfig {
    fn default() -> Self {
        let d = |s: &str| s.parse::<Decimal>().unwrap_or(Decimal::ONE);
        Self {
            name: "SIMULATED".to_string(),
            base_rates: vec![
                BaseRate::new("SGD", "PHP", d("42.50")).with_spread(d("1.0")),
                BaseRate::new("USD", "SGD", d("1.3450")).with_spread(d("0.4")),
                BaseRate::new("USD", "PHP", d("56.20")).with_spread(d("0.8")),
                BaseRate::new("USD", "IDR", d("15850")).with_spread(d("1.0")),
                BaseRate::new("USD", "INR", d("83.20")).with_spread(d("0.6")),
                BaseRate::new("USD", "MXN", d("17.10")).with_spread(d("0.8")),
                BaseRate::new("USD", "JPY", d("151.30")).with_spread(d("0.3")),
                BaseRate::new("GBP", "USD", d("1.2700")).with_spread(d("0.3")),
                BaseRate::new("EUR", "USD", d("1.0850")).with_spread(d("0.3")),
            ],
            default_spread_percent: d("0.5"),
            bridge_currencies: vec![Currency::usd()],
            allow_inversion: true,
            quote_validity: Duration::seconds(30),
            drift: DriftConfig::default(),
            seed: None,
        }
    }
}

impl SimulatedProviderConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        let valid_spread = |s: Decimal| s > Decimal::ZERO && s < Decimal::from(200);

        if !valid_spread(self.default_spread_percent) {
            return Err("Default spread must be between 0 and 200 percent".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for base in &self.base_rates {
            if base.pair.is_identity() {
                return Err(format!("Base rate {} maps a currency to itself", base.pair));
            }
            if base.mid <= Decimal::ZERO {
                return Err(format!("Base rate {} must be positive", base.pair));
            }
            if let Some(spread) = base.spread_percent {
                if !valid_spread(spread) {
                    return Err(format!("Spread for {} must be between 0 and 200 percent", base.pair));
                }
            }
            if !seen.insert(base.pair.clone()) {
                return Err(format!("Duplicate base rate {}", base.pair));
            }
        }

        if self.drift.max_step < Decimal::ZERO {
            return Err("Drift step cannot be negative".to_string());
        }

        if self.drift.max_offset < Decimal::ZERO || self.drift.max_offset >= Decimal::ONE {
            return Err("Drift bound must be in [0, 1)".to_string());
        }

        if self.drift.update_interval < Duration::zero() {
            return Err("Drift interval cannot be negative".to_string());
        }

        if self.quote_validity <= Duration::zero() {
            return Err("Quote validity must be positive".to_string());
        }

        Ok(())
    }
}

/// Per-pair drift walk.
struct DriftState {
    offset: Decimal,
    last_update: Timestamp,
    /// Serve the current offset unchanged on the next read.
    pinned: bool,
    rng: StdRng,
}

/// How a pair is priced from configured base rates.
#[derive(Debug, Clone, PartialEq)]
enum Leg {
    Direct(CurrencyPair),
    /// Priced as the reciprocal of the named base pair.
    Inverse(CurrencyPair),
}

#[derive(Debug, Clone, PartialEq)]
enum Route {
    Single(Leg),
    Bridge(Leg, Leg),
}

/// Rate provider backed by a static table of base rates plus simulated drift.
///
/// Each instance owns its drift state, so several providers (for example in
/// tests) never interfere with each other.
pub struct SimulatedRateProvider {
    config: SimulatedProviderConfig,
    base: HashMap<CurrencyPair, BaseRate>,
    drift: DashMap<CurrencyPair, Arc<Mutex<DriftState>>>,
}

impl SimulatedRateProvider {
    /// Create a provider, validating its configuration.
    pub fn new(config: SimulatedProviderConfig) -> FxResult<Self> {
        config.validate().map_err(FxError::InvalidConfig)?;

        let base = config
            .base_rates
            .iter()
            .map(|b| (b.pair.clone(), b.clone()))
            .collect();

        Ok(Self {
            config,
            base,
            drift: DashMap::new(),
        })
    }

    /// Configured base mid for a pair, without drift.
    pub fn base_rate(&self, pair: &CurrencyPair) -> Option<Decimal> {
        self.base.get(pair).map(|b| b.mid)
    }

    /// Current drift offset for a base pair, if its walk has started.
    pub fn drift_offset(&self, pair: &CurrencyPair) -> Option<Decimal> {
        self.drift.get(pair).map(|state| state.lock().offset)
    }

    /// Force a base pair's drift offset (fraction, e.g. `0.05` for +5%).
    #[instrument(skip(self), fields(pair = %pair))]
    pub fn set_drift(&self, pair: &CurrencyPair, offset: Decimal) -> FxResult<()> {
        if !self.base.contains_key(pair) {
            return Err(FxError::unsupported(pair));
        }
        if offset.abs() >= Decimal::ONE {
            return Err(FxError::InvalidConfig(format!(
                "drift offset {offset} would make {pair} non-positive"
            )));
        }

        let state = self.drift_state(pair);
        let mut state = state.lock();
        state.offset = offset;
        state.last_update = ratedesk_common::now();
        state.pinned = true;

        info!(offset = %offset, "Drift overridden");
        Ok(())
    }

    /// Clear every drift offset back to the base rates.
    pub fn reset_drift(&self) {
        self.drift.clear();
        info!(provider = %self.config.name, "Drift reset");
    }

    fn drift_state(&self, pair: &CurrencyPair) -> Arc<Mutex<DriftState>> {
        self.drift
            .entry(pair.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(DriftState {
                    offset: Decimal::ZERO,
                    last_update: ratedesk_common::now(),
                    pinned: true,
                    rng: self.rng_for(pair),
                }))
            })
            .clone()
    }

    fn rng_for(&self, pair: &CurrencyPair) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ pair_hash(pair)),
            None => StdRng::from_entropy(),
        }
    }

    /// Base mid of a configured pair with its drift applied, advancing the
    /// walk if the update interval has elapsed.
    ///
    /// An override larger than `max_offset` is never pushed further out; the
    /// walk can only bring it back towards the bound.
    fn drifted_mid(&self, pair: &CurrencyPair, base_mid: Decimal) -> Decimal {
        let drift = &self.config.drift;
        let state = self.drift_state(pair);
        let mut state = state.lock();

        let now = ratedesk_common::now();
        if state.pinned {
            state.pinned = false;
        } else if drift.enabled && now - state.last_update >= drift.update_interval {
            let unit: f64 = state.rng.gen_range(-1.0..=1.0);
            let step = Decimal::from_f64(unit).unwrap_or(Decimal::ZERO) * drift.max_step;
            let bound = drift.max_offset.max(state.offset.abs());
            state.offset = (state.offset + step).round_dp(10).clamp(-bound, bound);
            state.last_update = now;
            debug!(pair = %pair, offset = %state.offset, "Drift advanced");
        }

        base_mid * (Decimal::ONE + state.offset)
    }

    fn leg(&self, pair: &CurrencyPair) -> Option<Leg> {
        if self.base.contains_key(pair) {
            return Some(Leg::Direct(pair.clone()));
        }
        let inverse = pair.inverse();
        if self.config.allow_inversion && self.base.contains_key(&inverse) {
            return Some(Leg::Inverse(inverse));
        }
        None
    }

    fn route(&self, pair: &CurrencyPair) -> Option<Route> {
        if pair.is_identity() {
            return None;
        }
        if let Some(leg) = self.leg(pair) {
            return Some(Route::Single(leg));
        }
        self.config
            .bridge_currencies
            .iter()
            .filter(|x| **x != pair.source && **x != pair.target)
            .find_map(|x| {
                let first = self.leg(&CurrencyPair::new(pair.source.clone(), x.clone()))?;
                let second = self.leg(&CurrencyPair::new(x.clone(), pair.target.clone()))?;
                Some(Route::Bridge(first, second))
            })
    }

    fn price_leg(&self, leg: &Leg) -> Decimal {
        match leg {
            Leg::Direct(pair) => self.drifted_mid(pair, self.base[pair].mid),
            Leg::Inverse(pair) => Decimal::ONE / self.drifted_mid(pair, self.base[pair].mid),
        }
    }

    fn spread_for(&self, route: &Route) -> Decimal {
        match route {
            Route::Single(Leg::Direct(pair)) | Route::Single(Leg::Inverse(pair)) => self.base[pair]
                .spread_percent
                .unwrap_or(self.config.default_spread_percent),
            Route::Bridge(..) => self.config.default_spread_percent,
        }
    }
}

#[async_trait]
impl RateProvider for SimulatedRateProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<Rate> {
        let route = self.route(pair).ok_or_else(|| FxError::unsupported(pair))?;

        let mid = match &route {
            Route::Single(leg) => self.price_leg(leg),
            Route::Bridge(first, second) => self.price_leg(first) * self.price_leg(second),
        };

        debug!(pair = %pair, route = ?route, mid = %mid, "Simulated rate");

        Ok(Rate::new(
            pair.clone(),
            mid,
            self.spread_for(&route),
            self.config.quote_validity,
            self.config.name.clone(),
        ))
    }

    fn supports_pair(&self, pair: &CurrencyPair) -> bool {
        self.route(pair).is_some()
    }

    fn supported_pairs(&self) -> Vec<CurrencyPair> {
        let mut pairs: Vec<CurrencyPair> = self.base.keys().cloned().collect();
        pairs.sort();
        pairs
    }
}

/// FNV-1a over the pair text; stable across runs, unlike `DefaultHasher`.
fn pair_hash(pair: &CurrencyPair) -> u64 {
    pair.source
        .code()
        .bytes()
        .chain(std::iter::once(b'/'))
        .chain(pair.target.code().bytes())
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn still_provider() -> SimulatedRateProvider {
        let config = SimulatedProviderConfig {
            drift: DriftConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        SimulatedRateProvider::new(config).unwrap()
    }

    fn walking_provider(seed: u64) -> SimulatedRateProvider {
        let config = SimulatedProviderConfig {
            drift: DriftConfig {
                enabled: true,
                update_interval: Duration::zero(),
                max_step: dec!(0.001),
                max_offset: dec!(0.01),
            },
            seed: Some(seed),
            ..Default::default()
        };
        SimulatedRateProvider::new(config).unwrap()
    }

    fn close(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() <= eps
    }

    #[tokio::test]
    async fn test_direct_rate_with_spread() {
        let provider = still_provider();
        let rate = provider.get_rate(&CurrencyPair::new("SGD", "PHP")).await.unwrap();

        assert_eq!(rate.mid, dec!(42.50));
        assert_eq!(rate.bid, dec!(42.2875));
        assert_eq!(rate.ask, dec!(42.7125));
        assert_eq!(rate.source, "SIMULATED");
    }

    #[tokio::test]
    async fn test_inverse_rate() {
        let provider = still_provider();
        let forward = provider.get_rate(&CurrencyPair::new("SGD", "PHP")).await.unwrap();
        let inverse = provider.get_rate(&CurrencyPair::new("PHP", "SGD")).await.unwrap();

        assert!(close(forward.mid * inverse.mid, Decimal::ONE, dec!(0.000000001)));
        assert_eq!(inverse.spread_percent, forward.spread_percent);
    }

    #[tokio::test]
    async fn test_inversion_can_be_disabled() {
        let config = SimulatedProviderConfig {
            allow_inversion: false,
            bridge_currencies: vec![],
            ..Default::default()
        };
        let provider = SimulatedRateProvider::new(config).unwrap();

        let result = provider.get_rate(&CurrencyPair::new("PHP", "SGD")).await;
        assert!(matches!(result, Err(FxError::UnsupportedPair { .. })));
    }

    #[tokio::test]
    async fn test_bridge_rate() {
        let provider = still_provider();
        // SGD/INR is not configured; it bridges through USD (SGD->USD inverse, USD->INR direct).
        let bridged = provider.get_rate(&CurrencyPair::new("SGD", "INR")).await.unwrap();
        let sgd_usd = provider.get_rate(&CurrencyPair::new("SGD", "USD")).await.unwrap();
        let usd_inr = provider.get_rate(&CurrencyPair::new("USD", "INR")).await.unwrap();

        assert!(close(bridged.mid, sgd_usd.mid * usd_inr.mid, dec!(0.000000001)));
        assert_eq!(bridged.spread_percent, dec!(0.5));
        assert!(bridged.bid < bridged.mid && bridged.mid < bridged.ask);
    }

    #[tokio::test]
    async fn test_unsupported_pairs() {
        let provider = still_provider();

        for pair in [CurrencyPair::new("SGD", "XYZ"), CurrencyPair::new("SGD", "SGD")] {
            let result = provider.get_rate(&pair).await;
            assert!(matches!(result, Err(FxError::UnsupportedPair { .. })));
            assert!(!provider.supports_pair(&pair));
        }
    }

    #[tokio::test]
    async fn test_set_and_reset_drift() {
        let provider = walking_provider(7);
        let pair = CurrencyPair::new("SGD", "PHP");
        let base = provider.base_rate(&pair).unwrap();

        provider.set_drift(&pair, dec!(0.05)).unwrap();
        let drifted = provider.get_rate(&pair).await.unwrap();
        assert_eq!(drifted.mid, base * dec!(1.05));

        // Later steps may only pull an out-of-bound override back in.
        let walked = provider.get_rate(&pair).await.unwrap();
        assert!(walked.mid <= base * dec!(1.05));
        assert!(walked.mid >= base * dec!(1.049));

        provider.reset_drift();
        let reset = provider.get_rate(&pair).await.unwrap();
        assert_eq!(reset.mid, base);
    }

    #[tokio::test]
    async fn test_set_drift_requires_base_pair() {
        let provider = still_provider();

        assert!(provider.set_drift(&CurrencyPair::new("PHP", "SGD"), dec!(0.01)).is_err());
        assert!(provider.set_drift(&CurrencyPair::new("SGD", "PHP"), dec!(1.5)).is_err());
    }

    #[tokio::test]
    async fn test_seeded_drift_is_reproducible() {
        let a = walking_provider(42);
        let b = walking_provider(42);
        let pair = CurrencyPair::new("USD", "PHP");

        for _ in 0..20 {
            let ra = a.get_rate(&pair).await.unwrap();
            let rb = b.get_rate(&pair).await.unwrap();
            assert_eq!(ra.mid, rb.mid);
        }
    }

    #[tokio::test]
    async fn test_drift_stays_bounded() {
        let provider = walking_provider(3);
        let pair = CurrencyPair::new("USD", "JPY");
        let base = provider.base_rate(&pair).unwrap();

        for _ in 0..500 {
            let rate = provider.get_rate(&pair).await.unwrap();
            assert!(close(rate.mid, base, base * dec!(0.01)));
        }
        assert!(provider.drift_offset(&pair).unwrap().abs() <= dec!(0.01));
    }

    #[tokio::test]
    async fn test_drift_waits_for_interval() {
        let config = SimulatedProviderConfig {
            drift: DriftConfig {
                update_interval: Duration::hours(1),
                ..Default::default()
            },
            seed: Some(1),
            ..Default::default()
        };
        let provider = SimulatedRateProvider::new(config).unwrap();
        let pair = CurrencyPair::new("SGD", "PHP");

        let first = provider.get_rate(&pair).await.unwrap();
        let second = provider.get_rate(&pair).await.unwrap();

        assert_eq!(first.mid, second.mid);
        assert_eq!(provider.drift_offset(&pair), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_providers_do_not_share_drift() {
        let a = still_provider();
        let b = still_provider();
        let pair = CurrencyPair::new("SGD", "PHP");

        a.set_drift(&pair, dec!(0.02)).unwrap();

        assert_eq!(b.get_rate(&pair).await.unwrap().mid, dec!(42.50));
        assert_eq!(a.get_rate(&pair).await.unwrap().mid, dec!(43.35));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_access() {
        let provider = Arc::new(walking_provider(9));
        let mut handles = Vec::new();

        for i in 0..16 {
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                let pair = if i % 2 == 0 {
                    CurrencyPair::new("SGD", "PHP")
                } else {
                    CurrencyPair::new("PHP", "USD")
                };
                for _ in 0..50 {
                    let rate = provider.get_rate(&pair).await.unwrap();
                    assert!(rate.bid < rate.mid && rate.mid < rate.ask);
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = SimulatedProviderConfig {
            base_rates: vec![BaseRate::new("SGD", "PHP", dec!(42.5)).with_spread(Decimal::ZERO)],
            ..Default::default()
        };
        assert!(SimulatedRateProvider::new(config).is_err());

        let config = SimulatedProviderConfig {
            base_rates: vec![BaseRate::new("SGD", "PHP", dec!(-1))],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pair_hash_is_directional() {
        assert_ne!(
            pair_hash(&CurrencyPair::new("SGD", "PHP")),
            pair_hash(&CurrencyPair::new("PHP", "SGD"))
        );
    }
}
