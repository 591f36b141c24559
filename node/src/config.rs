//! Node configuration.

use std::path::PathBuf;

use chrono::Duration;
use ratedesk_common::{Currency, CurrencyPair};
use ratedesk_fx::RateServiceConfig;

/// Main node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Node ID for log correlation.
    pub node_id: Option<String>,
    /// Rate service configuration.
    pub service: RateServiceConfig,
    /// How often the in-memory store drops expired entries.
    pub reaper_interval: Duration,
    /// How often store statistics are logged.
    pub stats_interval: Duration,
    /// Corridor table (JSON). The built-in table is used when unset.
    pub corridors_path: Option<PathBuf>,
    /// Fixed seed for reproducible drift.
    pub seed: Option<u64>,
    /// Pairs pushed by the rate stream.
    pub stream_pairs: Vec<CurrencyPair>,
    /// Emit JSON logs.
    pub json_logs: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            service: RateServiceConfig::default(),
            reaper_interval: Duration::seconds(1),
            stats_interval: Duration::seconds(30),
            corridors_path: None,
            seed: None,
            stream_pairs: vec![
                CurrencyPair::new("SGD", "PHP"),
                CurrencyPair::new("USD", "SGD"),
            ],
            json_logs: false,
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            service: RateServiceConfig::from_env(),
            ..Self::default()
        };

        if let Ok(id) = std::env::var("NODE_ID") {
            config.node_id = Some(id);
        }

        if let Ok(ms) = std::env::var("REAPER_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                config.reaper_interval = Duration::milliseconds(ms);
            }
        }

        if let Ok(path) = std::env::var("CORRIDORS_PATH") {
            config.corridors_path = Some(PathBuf::from(path));
        }

        if let Ok(seed) = std::env::var("RATE_SEED") {
            if let Ok(seed) = seed.parse() {
                config.seed = Some(seed);
            }
        }

        if let Ok(pairs) = std::env::var("STREAM_PAIRS") {
            if let Ok(pairs) = parse_pairs(&pairs) {
                config.stream_pairs = pairs;
            }
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.json_logs = format.eq_ignore_ascii_case("json");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.reaper_interval <= Duration::zero() {
            return Err("Reaper interval must be positive".to_string());
        }

        if self.stats_interval <= Duration::zero() {
            return Err("Stats interval must be positive".to_string());
        }

        if let Some(pair) = self.stream_pairs.iter().find(|p| p.is_identity()) {
            return Err(format!("Stream pair {pair} maps a currency to itself"));
        }

        self.service.validate()
    }
}

/// Parse `SRC/TGT`.
pub fn parse_pair(s: &str) -> Result<CurrencyPair, String> {
    let (source, target) = s
        .trim()
        .split_once('/')
        .ok_or_else(|| format!("expected SRC/TGT, got {s:?}"))?;
    let source = Currency::parse(source).map_err(|e| e.to_string())?;
    let target = Currency::parse(target).map_err(|e| e.to_string())?;
    Ok(CurrencyPair::new(source, target))
}

/// Parse a comma-separated list of `SRC/TGT` pairs.
pub fn parse_pairs(s: &str) -> Result<Vec<CurrencyPair>, String> {
    s.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(parse_pair)
        .collect()
}
