//! Rate value types: market rates, margin-adjusted rates and quotes.

use chrono::Duration;
use ratedesk_common::{Currency, CurrencyPair, Money, QuoteId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// A market rate snapshot for a currency pair.
///
/// `bid` and `ask` sit symmetrically around `mid` so that
/// `(ask - bid) / mid * 100 == spread_percent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    /// The currency pair.
    pub pair: CurrencyPair,
    /// Mid-market rate (units of target per unit of source).
    pub mid: Decimal,
    /// Lower side of the market.
    pub bid: Decimal,
    /// Upper side of the market.
    pub ask: Decimal,
    /// Full bid/ask spread as a percentage of mid.
    pub spread_percent: Decimal,
    /// Name of the provider that produced the rate.
    pub source: String,
    /// When this rate was produced.
    pub fetched_at: Timestamp,
    /// When this rate stops being quotable.
    pub valid_until: Timestamp,
}

impl Rate {
    /// Build a rate from its mid and full spread percentage.
    pub fn new(
        pair: CurrencyPair,
        mid: Decimal,
        spread_percent: Decimal,
        valid_for: Duration,
        source: impl Into<String>,
    ) -> Self {
        let half = spread_percent / Decimal::from(200);
        let now = ratedesk_common::now();
        Self {
            pair,
            mid,
            bid: mid * (Decimal::ONE - half),
            ask: mid * (Decimal::ONE + half),
            spread_percent,
            source: source.into(),
            fetched_at: now,
            valid_until: now + valid_for,
        }
    }

    /// Check if the rate is still quotable.
    pub fn is_valid(&self) -> bool {
        ratedesk_common::now() < self.valid_until
    }

    /// Get the spread in basis points.
    pub fn spread_bps(&self) -> Decimal {
        if self.mid.is_zero() {
            return Decimal::ZERO;
        }
        ((self.ask - self.bid) / self.mid) * Decimal::from(10_000)
    }
}

/// A market rate with the corridor margin applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    #[serde(flatten)]
    pub rate: Rate,
    /// Customer-facing rate: `mid * (1 - margin_percent / 100)`.
    pub buy_rate: Decimal,
    /// Margin taken off mid, in percent.
    pub margin_percent: Decimal,
}

impl ExchangeRate {
    /// Apply a margin (in percent) to a market rate.
    ///
    /// The margin only moves the buy rate; bid and ask are reported as the
    /// market produced them.
    pub fn with_margin(rate: Rate, margin_percent: Decimal) -> Self {
        let buy_rate = rate.mid * (Decimal::ONE - margin_percent / HUNDRED);
        Self {
            rate,
            buy_rate,
            margin_percent,
        }
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.rate.pair
    }

    pub fn mid(&self) -> Decimal {
        self.rate.mid
    }

    pub fn valid_until(&self) -> Timestamp {
        self.rate.valid_until
    }
}

/// A priced offer to convert a source amount into the target currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: QuoteId,
    pub source_currency: Currency,
    pub target_currency: Currency,
    /// Amount the customer sends, before fees.
    pub source_amount: Money,
    /// Amount delivered, rounded to the target currency's minor units.
    pub target_amount: Money,
    /// Buy rate used for the conversion.
    pub exchange_rate: Decimal,
    pub mid_market_rate: Decimal,
    /// Fee charged in the source currency.
    pub fee: Money,
    /// `source_amount + fee`.
    pub total_cost: Money,
    pub valid_until: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sgd_php(mid: Decimal, spread: Decimal) -> Rate {
        Rate::new(
            CurrencyPair::new("SGD", "PHP"),
            mid,
            spread,
            Duration::seconds(30),
            "TEST",
        )
    }

    #[test]
    fn test_bid_ask_from_spread() {
        let rate = sgd_php(dec!(42.50), dec!(1.0));

        assert_eq!(rate.bid, dec!(42.2875));
        assert_eq!(rate.ask, dec!(42.7125));
        assert!(rate.bid < rate.mid && rate.mid < rate.ask);
        assert_eq!(rate.spread_bps(), dec!(100));
    }

    #[test]
    fn test_rate_validity() {
        let rate = sgd_php(dec!(42.50), dec!(1.0));
        assert!(rate.is_valid());
        assert!(rate.valid_until > rate.fetched_at);
    }

    #[test]
    fn test_margin_applies_to_mid() {
        let rate = sgd_php(dec!(42.50), dec!(1.0));
        let exchange = ExchangeRate::with_margin(rate.clone(), dec!(0.3));

        assert_eq!(exchange.buy_rate, dec!(42.3725));
        assert!(exchange.buy_rate <= exchange.mid());
        assert_eq!(exchange.rate.bid, rate.bid);
    }

    #[test]
    fn test_zero_margin_buys_at_mid() {
        let exchange = ExchangeRate::with_margin(sgd_php(dec!(42.50), dec!(1.0)), Decimal::ZERO);
        assert_eq!(exchange.buy_rate, exchange.mid());
    }

    #[test]
    fn test_exchange_rate_json_is_flat() {
        let exchange = ExchangeRate::with_margin(sgd_php(dec!(42.50), dec!(1.0)), dec!(0.3));
        let json = serde_json::to_value(&exchange).unwrap();

        assert!(json.get("mid").is_some());
        assert!(json.get("buy_rate").is_some());
        assert!(json.get("rate").is_none());

        let back: ExchangeRate = serde_json::from_value(json).unwrap();
        assert_eq!(back, exchange);
    }
}
