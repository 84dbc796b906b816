//! Node configuration, read from `FAIRPRICE_*` environment variables

use config::Environment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use fairprice_core::{CoreError, CoreResult, BTC_USD, ENV_PREFIX};

/// How each fair price is written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `INSTRUMENT<TAB>TIME<TAB>PRICE`
    #[default]
    Text,
    /// One JSON observation per line
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub instrument: String,
    /// Number of synthetic feeds
    pub sources: usize,
    /// Center of the synthetic random walk
    pub base_price: f64,
    /// Upper bound of the random pause between synthetic prices
    pub max_emit_interval_ms: u64,
    /// Probability that a synthetic feed fails instead of emitting a price
    pub failure_rate: f64,
    pub output: OutputFormat,
    pub log_format: LogFormat,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            instrument: BTC_USD.to_string(),
            sources: 100,
            base_price: 30_000.0,
            max_emit_interval_ms: 3_000,
            failure_rate: 0.0,
            output: OutputFormat::Text,
            log_format: LogFormat::Pretty,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> CoreResult<Self> {
        let config: Self = fairprice_core::load(Environment::with_prefix(ENV_PREFIX))?;
        config.validate()?;
        Ok(config)
    }

    pub fn max_emit_interval(&self) -> Duration {
        Duration::from_millis(self.max_emit_interval_ms)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.instrument.is_empty() {
            return Err(CoreError::InvalidConfig("instrument must not be empty".into()));
        }
        if self.sources == 0 {
            return Err(CoreError::InvalidConfig("at least one source is required".into()));
        }
        if !(self.base_price.is_finite() && self.base_price > 0.0) {
            return Err(CoreError::InvalidConfig(format!("invalid base price: {}", self.base_price)));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(CoreError::InvalidConfig(format!(
                "failure_rate must be within [0, 1], got {}",
                self.failure_rate
            )));
        }
        Ok(())
    }
}
