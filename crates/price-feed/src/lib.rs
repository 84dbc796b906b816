//! Fair price aggregation engine
//!
//! Features:
//! - One worker per upstream feed, resubscribing on every failure
//! - Snapshot state readable while workers write
//! - Freshness-weighted averaging with a staleness cutoff
//! - Wall-clock aligned ticks with terminal insufficient-data handling

pub mod aggregator;
pub mod averager;
pub mod feeds;
pub mod state;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::FairPriceAggregator;
pub use averager::{weighted_average, WeightedPrice};
pub use feeds::{PriceFeed, PriceSender, PriceStream};
pub use state::{SourceSnapshot, SourceState};
pub use worker::SourceWorker;
