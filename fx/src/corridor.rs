//! Static corridor registry.

use std::collections::{BTreeSet, HashMap};

use ratedesk_common::{Currency, CurrencyPair, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

/// Pricing policy for one source -> target pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    pub source_currency: Currency,
    pub target_currency: Currency,
    pub enabled: bool,
    /// Fee as a percentage of the source amount.
    pub fee_percentage: Decimal,
    /// Fee floor, in the source currency.
    pub fee_minimum: Money,
    /// Margin taken off mid, in percent.
    pub margin_percentage: Decimal,
    #[serde(default)]
    pub allowed_payout_methods: BTreeSet<String>,
}

impl Corridor {
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.source_currency.clone(), self.target_currency.clone())
    }

    /// Whether a payout method (e.g. `bank_transfer`) is permitted.
    pub fn is_method_allowed(&self, method: &str) -> bool {
        self.allowed_payout_methods.contains(method)
    }

    fn validate(&self) -> FxResult<()> {
        let pair = self.pair();
        if pair.is_identity() {
            return Err(FxError::InvalidConfig(format!("corridor {pair} maps a currency to itself")));
        }
        if self.fee_percentage < Decimal::ZERO || self.margin_percentage < Decimal::ZERO {
            return Err(FxError::InvalidConfig(format!("corridor {pair} has a negative fee or margin")));
        }
        if self.margin_percentage >= Decimal::ONE_HUNDRED {
            return Err(FxError::InvalidConfig(format!("corridor {pair} margin must be below 100%")));
        }
        if self.fee_minimum.currency != self.source_currency {
            return Err(FxError::InvalidConfig(format!(
                "corridor {pair} fee minimum is in {}, expected {}",
                self.fee_minimum.currency, self.source_currency
            )));
        }
        Ok(())
    }
}

/// Read-only lookup table of corridors, keyed by pair.
#[derive(Debug, Clone, Default)]
pub struct CorridorRegistry {
    corridors: Vec<Corridor>,
    by_pair: HashMap<CurrencyPair, usize>,
}

impl CorridorRegistry {
    /// Build a registry, rejecting duplicate pairs and malformed entries.
    pub fn new(corridors: Vec<Corridor>) -> FxResult<Self> {
        let mut by_pair = HashMap::with_capacity(corridors.len());
        for (idx, corridor) in corridors.iter().enumerate() {
            corridor.validate()?;
            if by_pair.insert(corridor.pair(), idx).is_some() {
                return Err(FxError::InvalidConfig(format!(
                    "duplicate corridor {}",
                    corridor.pair()
                )));
            }
        }
        Ok(Self { corridors, by_pair })
    }

    /// Load corridors from a JSON array.
    pub fn from_json(json: &str) -> FxResult<Self> {
        let corridors: Vec<Corridor> = serde_json::from_str(json)?;
        Self::new(corridors)
    }

    /// Look up the corridor for a pair, enabled or not.
    pub fn find(&self, pair: &CurrencyPair) -> Option<&Corridor> {
        self.by_pair.get(pair).map(|idx| &self.corridors[*idx])
    }

    /// List corridors, optionally restricted to one source currency.
    pub fn list(&self, source: Option<&Currency>) -> Vec<Corridor> {
        self.corridors
            .iter()
            .filter(|c| source.map_or(true, |s| &c.source_currency == s))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.corridors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corridors.is_empty()
    }

    /// Sample table used by the node binary when no corridor file is given.
    pub fn builtin() -> FxResult<Self> {
        let methods = |m: &[&str]| m.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        let corridor = |source: &str, target: &str, fee: Decimal, min: Decimal, margin: Decimal, payout: &[&str]| Corridor {
            source_currency: Currency::new(source),
            target_currency: Currency::new(target),
            enabled: true,
            fee_percentage: fee,
            fee_minimum: Money::new(min, Currency::new(source)),
            margin_percentage: margin,
            allowed_payout_methods: methods(payout),
        };

        let corridors = vec![
            corridor("SGD", "PHP", Decimal::new(5, 1), Decimal::new(300, 2), Decimal::new(3, 1), &["bank_transfer", "mobile_wallet", "cash_pickup"]),
            corridor("SGD", "IDR", Decimal::new(5, 1), Decimal::new(300, 2), Decimal::new(4, 1), &["bank_transfer", "mobile_wallet"]),
            corridor("SGD", "INR", Decimal::new(4, 1), Decimal::new(250, 2), Decimal::new(3, 1), &["bank_transfer"]),
            corridor("USD", "PHP", Decimal::new(7, 1), Decimal::new(499, 2), Decimal::new(5, 1), &["bank_transfer", "cash_pickup"]),
            corridor("USD", "MXN", Decimal::new(6, 1), Decimal::new(399, 2), Decimal::new(4, 1), &["bank_transfer", "cash_pickup"]),
            corridor("GBP", "INR", Decimal::new(5, 1), Decimal::new(200, 2), Decimal::new(3, 1), &["bank_transfer"]),
        ];

        Self::new(corridors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_corridor(source: &str, target: &str) -> Corridor {
        Corridor {
            source_currency: Currency::new(source),
            target_currency: Currency::new(target),
            enabled: true,
            fee_percentage: dec!(0.5),
            fee_minimum: Money::new(dec!(3.00), Currency::new(source)),
            margin_percentage: dec!(0.3),
            allowed_payout_methods: ["bank_transfer".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn test_find_and_filter() {
        let registry = CorridorRegistry::new(vec![
            make_corridor("SGD", "PHP"),
            make_corridor("SGD", "INR"),
            make_corridor("USD", "PHP"),
        ])
        .unwrap();

        assert!(registry.find(&CurrencyPair::new("SGD", "PHP")).is_some());
        assert!(registry.find(&CurrencyPair::new("PHP", "SGD")).is_none());
        assert_eq!(registry.list(Some(&Currency::sgd())).len(), 2);
        assert_eq!(registry.list(None).len(), 3);
        assert!(registry.list(Some(&Currency::eur())).is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = CorridorRegistry::new(vec![make_corridor("SGD", "PHP"), make_corridor("SGD", "PHP")]);
        assert!(matches!(result, Err(FxError::InvalidConfig(_))));
    }

    #[test]
    fn test_fee_minimum_currency_checked() {
        let mut corridor = make_corridor("SGD", "PHP");
        corridor.fee_minimum = Money::new(dec!(3.00), Currency::usd());
        assert!(CorridorRegistry::new(vec![corridor]).is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"[{
            "source_currency": "SGD",
            "target_currency": "PHP",
            "enabled": true,
            "fee_percentage": "0.5",
            "fee_minimum": { "value": "3.00", "currency": "SGD" },
            "margin_percentage": "0.3",
            "allowed_payout_methods": ["bank_transfer", "mobile_wallet"]
        }]"#;

        let registry = CorridorRegistry::from_json(json).unwrap();
        let corridor = registry.find(&CurrencyPair::new("SGD", "PHP")).unwrap();

        assert_eq!(corridor.fee_minimum.value, dec!(3.00));
        assert!(corridor.is_method_allowed("mobile_wallet"));
        assert!(!corridor.is_method_allowed("cash_pickup"));
    }

    #[test]
    fn test_builtin_table_loads() {
        let registry = CorridorRegistry::builtin().unwrap();
        assert!(!registry.is_empty());
        assert!(registry.find(&CurrencyPair::new("SGD", "PHP")).is_some());
    }
}
