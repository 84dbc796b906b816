//! Core type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the BTC/USD pair
pub const BTC_USD: &str = "BTC_USD";

/// Opaque instrument identifier, e.g. a currency pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Instrument {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Price observation for one instrument
///
/// The price is kept as decimal text ("0", "12.2", "13.2345122") so no
/// precision is lost before aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub instrument: Instrument,
    pub timestamp: DateTime<Utc>,
    pub price: String,
}

impl Observation {
    pub fn new(instrument: Instrument, timestamp: DateTime<Utc>, price: impl Into<String>) -> Self {
        Self {
            instrument,
            timestamp,
            price: price.into(),
        }
    }

    /// Age relative to `now`; negative when the timestamp is in the future
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }
}
