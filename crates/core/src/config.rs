//! Configuration types

use config::{Config, Environment};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CoreError, CoreResult};

/// Prefix of every environment variable read by the aggregator
pub const ENV_PREFIX: &str = "FAIRPRICE";

/// Longest accepted tick period (one week)
pub const MAX_TICK_PERIOD_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Aggregation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairPriceConfig {
    /// Interval between fair price ticks
    pub tick_period_ms: u64,
    /// Staleness cutoff as a multiple of the tick period
    pub expiry_multiple: u32,
    /// Capacity of the output price channel
    pub channel_capacity: usize,
}

impl Default for FairPriceConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 60_000,
            expiry_multiple: 2,
            channel_capacity: 1,
        }
    }
}

impl FairPriceConfig {
    pub fn new(tick_period: Duration, expiry_multiple: u32) -> Self {
        Self {
            tick_period_ms: tick_period.as_millis() as u64,
            expiry_multiple,
            ..Default::default()
        }
    }

    /// Load from `FAIRPRICE_*` environment variables, falling back to defaults
    pub fn from_env() -> CoreResult<Self> {
        let config: Self = load(Environment::with_prefix(ENV_PREFIX))?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Age at which a source's price stops contributing
    pub fn expiry_period(&self) -> Duration {
        self.tick_period()
            .checked_mul(self.expiry_multiple)
            .unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.tick_period_ms == 0 {
            return Err(CoreError::InvalidConfig("tick_period_ms must be positive".into()));
        }
        if self.tick_period_ms > MAX_TICK_PERIOD_MS {
            return Err(CoreError::InvalidConfig(format!(
                "tick_period_ms must be at most {}, got {}",
                MAX_TICK_PERIOD_MS, self.tick_period_ms
            )));
        }
        if self.expiry_multiple == 0 {
            return Err(CoreError::InvalidConfig("expiry_multiple must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(CoreError::InvalidConfig("channel_capacity must be positive".into()));
        }
        if self.tick_period().checked_mul(self.expiry_multiple).is_none() {
            return Err(CoreError::InvalidConfig(format!(
                "expiry period overflows: {}ms x {}",
                self.tick_period_ms, self.expiry_multiple
            )));
        }
        Ok(())
    }
}

/// Deserialize a config section from an environment source
pub fn load<T: DeserializeOwned>(source: Environment) -> CoreResult<T> {
    let config = Config::builder()
        .add_source(source.try_parsing(true))
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = FairPriceConfig::default();

        assert_eq!(config.tick_period(), Duration::from_secs(60));
        assert_eq!(config.expiry_period(), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config: FairPriceConfig = load(env(&[
            ("FAIRPRICE_TICK_PERIOD_MS", "5000"),
            ("FAIRPRICE_CHANNEL_CAPACITY", "4"),
        ]))
        .unwrap();

        assert_eq!(config.tick_period(), Duration::from_secs(5));
        assert_eq!(config.expiry_period(), Duration::from_secs(10));
        assert_eq!(config.channel_capacity, 4);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let zero_period = FairPriceConfig::new(Duration::ZERO, 2);
        assert!(matches!(zero_period.validate(), Err(CoreError::InvalidConfig(_))));

        let zero_multiple = FairPriceConfig::new(Duration::from_secs(60), 0);
        assert!(matches!(zero_multiple.validate(), Err(CoreError::InvalidConfig(_))));

        let too_long = FairPriceConfig {
            tick_period_ms: MAX_TICK_PERIOD_MS + 1,
            ..Default::default()
        };
        assert!(matches!(too_long.validate(), Err(CoreError::InvalidConfig(_))));

        let week = FairPriceConfig {
            tick_period_ms: MAX_TICK_PERIOD_MS,
            ..Default::default()
        };
        assert!(week.validate().is_ok());

        let zero_capacity = FairPriceConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(zero_capacity.validate().is_err());
    }

    #[test]
    fn test_unparseable_value_is_config_error() {
        let result: CoreResult<FairPriceConfig> =
            load(env(&[("FAIRPRICE_TICK_PERIOD_MS", "soon")]));

        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
