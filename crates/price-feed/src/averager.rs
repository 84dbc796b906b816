//! Freshness-weighted fair price
//!
//! Each usable source contributes with `weight = 1 - age / expiry`: 1 for a
//! brand new price, falling linearly to 0 at the expiry period. Sources at or
//! past expiry, in error, or with unparseable prices contribute nothing.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use std::time::Duration;

use fairprice_core::{FeedError, FeedResult};
use crate::state::SourceSnapshot;

/// Decimal places of every published fair price
pub const PRICE_DECIMALS: u32 = 8;

/// Result of one aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPrice {
    pub value: Decimal,
    /// Number of sources with a non-zero weight
    pub sources: usize,
}

impl WeightedPrice {
    /// Fixed 8-decimal text form
    ///
    /// Padding happens in the text, so large values keep all 8 places even
    /// where the decimal scale cannot reach 8.
    pub fn formatted(&self) -> String {
        let value = self
            .value
            .round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.*}", PRICE_DECIMALS as usize, value)
    }
}

/// Parse decimal price text, plain or scientific; `None` when malformed
///
/// Values beyond the decimal range (about ±7.9e28) count as malformed.
pub fn parse_price(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Linear freshness weight in `[0, 1]`
///
/// Future timestamps count as age zero.
pub fn weight(age: chrono::Duration, expiry: Duration) -> Decimal {
    let Ok(expiry) = chrono::Duration::from_std(expiry) else {
        return Decimal::ONE;
    };
    if age >= expiry {
        return Decimal::ZERO;
    }
    if age <= chrono::Duration::zero() {
        return Decimal::ONE;
    }

    match (age.num_nanoseconds(), expiry.num_nanoseconds()) {
        (Some(age_ns), Some(expiry_ns)) => {
            Decimal::ONE - Decimal::from(age_ns) / Decimal::from(expiry_ns)
        }
        // Beyond ~292 years; millisecond resolution is plenty there
        _ => {
            let age_ms = Decimal::from(age.num_milliseconds());
            let expiry_ms = Decimal::from(expiry.num_milliseconds());
            Decimal::ONE - age_ms / expiry_ms
        }
    }
}

/// Weighted average of all usable snapshots at `now`
pub fn weighted_average<'a, I>(snapshots: I, now: DateTime<Utc>, expiry: Duration) -> FeedResult<WeightedPrice>
where
    I: IntoIterator<Item = &'a SourceSnapshot>,
{
    let mut sum = Decimal::ZERO;
    let mut sum_weight = Decimal::ZERO;
    let mut sources = 0;

    for snapshot in snapshots {
        let Some(observation) = snapshot.usable_observation() else {
            continue;
        };
        let Some(price) = parse_price(&observation.price) else {
            continue;
        };

        let weight = weight(observation.age(now), expiry);
        if weight.is_zero() {
            continue;
        }

        let accumulated = weight
            .checked_mul(price)
            .and_then(|contribution| sum.checked_add(contribution))
            .zip(sum_weight.checked_add(weight));

        if let Some((next_sum, next_weight)) = accumulated {
            sum = next_sum;
            sum_weight = next_weight;
            sources += 1;
        }
    }

    if sum_weight.is_zero() {
        return Err(FeedError::NoValidData);
    }

    let value = sum.checked_div(sum_weight).ok_or(FeedError::NoValidData)?;
    Ok(WeightedPrice { value, sources })
}
