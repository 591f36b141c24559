//! Rate provider trait and a scripted test double.

use async_trait::async_trait;
use ratedesk_common::CurrencyPair;
use tracing::debug;

use crate::error::FxResult;
use crate::rate::Rate;

/// Trait for FX rate providers.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the current rate for a currency pair.
    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<Rate>;

    /// Get rates for several pairs. Pairs that fail are left out.
    async fn get_rates(&self, pairs: &[CurrencyPair]) -> Vec<Rate> {
        let mut rates = Vec::with_capacity(pairs.len());
        for pair in pairs {
            match self.get_rate(pair).await {
                Ok(rate) => rates.push(rate),
                Err(e) => {
                    debug!(provider = self.name(), pair = %pair, error = %e, "Dropping pair from batch");
                }
            }
        }
        rates
    }

    /// Check if this provider can produce a rate for the pair.
    fn supports_pair(&self, pair: &CurrencyPair) -> bool;

    /// Pairs with a configured base rate.
    fn supported_pairs(&self) -> Vec<CurrencyPair>;
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRateProvider;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;
    use dashmap::DashMap;
    use ratedesk_common::CurrencyPair;
    use rust_decimal::Decimal;

    use super::RateProvider;
    use crate::error::{FxError, FxResult};
    use crate::rate::Rate;

    /// Scripted provider that counts how often it is asked for rates.
    pub struct MockRateProvider {
        name: String,
        rates: DashMap<CurrencyPair, (Decimal, Decimal)>,
        calls: AtomicUsize,
        batch_calls: AtomicUsize,
    }

    impl MockRateProvider {
        /// Create a new mock provider.
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                rates: DashMap::new(),
                calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
            }
        }

        /// Set the mid and spread returned for a pair.
        pub fn set_rate(&self, pair: CurrencyPair, mid: Decimal, spread_percent: Decimal) {
            self.rates.insert(pair, (mid, spread_percent));
        }

        /// Number of single-pair rate computations served.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Number of batch requests received.
        pub fn batch_calls(&self) -> usize {
            self.batch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateProvider for MockRateProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<Rate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates
                .get(pair)
                .map(|entry| {
                    let (mid, spread) = *entry;
                    Rate::new(pair.clone(), mid, spread, Duration::seconds(30), self.name.clone())
                })
                .ok_or_else(|| FxError::unsupported(pair))
        }

        async fn get_rates(&self, pairs: &[CurrencyPair]) -> Vec<Rate> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            let mut rates = Vec::new();
            for pair in pairs {
                if let Ok(rate) = self.get_rate(pair).await {
                    rates.push(rate);
                }
            }
            rates
        }

        fn supports_pair(&self, pair: &CurrencyPair) -> bool {
            self.rates.contains_key(pair)
        }

        fn supported_pairs(&self) -> Vec<CurrencyPair> {
            self.rates.iter().map(|r| r.key().clone()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FxError;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockRateProvider::new("test");
        let pair = CurrencyPair::new("SGD", "PHP");
        provider.set_rate(pair.clone(), dec!(42.50), dec!(1.0));

        let rate = provider.get_rate(&pair).await.unwrap();

        assert_eq!(rate.pair, pair);
        assert_eq!(rate.bid, dec!(42.2875));
        assert_eq!(rate.source, "test");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_unsupported() {
        let provider = MockRateProvider::new("test");
        let result = provider.get_rate(&CurrencyPair::new("SGD", "XYZ")).await;

        assert!(matches!(result, Err(FxError::UnsupportedPair { .. })));
    }

    #[tokio::test]
    async fn test_batch_omits_failures() {
        let provider = MockRateProvider::new("test");
        provider.set_rate(CurrencyPair::new("SGD", "PHP"), dec!(42.50), dec!(1.0));
        provider.set_rate(CurrencyPair::new("USD", "SGD"), dec!(1.35), dec!(0.4));

        let rates = provider
            .get_rates(&[
                CurrencyPair::new("SGD", "PHP"),
                CurrencyPair::new("SGD", "XYZ"),
                CurrencyPair::new("USD", "SGD"),
            ])
            .await;

        assert_eq!(rates.len(), 2);
        assert_eq!(provider.batch_calls(), 1);
    }
}
