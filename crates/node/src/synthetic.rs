//! Synthetic random-walk feed

use chrono::Utc;
use std::time::Duration;
use tracing::debug;

use fairprice_core::{FeedError, Instrument, Observation};
use fairprice_feed::{PriceFeed, PriceStream};

/// Emits prices around a base with a per-subscription spread and jitter
///
/// Each subscription draws a constant spread of up to ±1% and adds up to
/// +0.1% of noise per sample, pausing a random time between samples.
#[derive(Debug, Clone)]
pub struct RandomWalkFeed {
    base_price: f64,
    max_interval: Duration,
    failure_rate: f64,
}

impl RandomWalkFeed {
    pub fn new(base_price: f64, max_interval: Duration) -> Self {
        Self {
            base_price,
            max_interval,
            failure_rate: 0.0,
        }
    }

    /// Fail a sample with this probability instead of emitting a price
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate;
        self
    }
}

impl PriceFeed for RandomWalkFeed {
    fn subscribe(&self, instrument: &Instrument) -> PriceStream {
        let (tx, stream) = PriceStream::channel(1);
        let feed = self.clone();
        let instrument = instrument.clone();

        tokio::spawn(async move {
            let spread = (rand::random::<f64>() - 0.5) * 2.0 * 1e-2;

            loop {
                if rand::random::<f64>() < feed.failure_rate {
                    debug!(%instrument, "Synthetic feed failure");
                    let _ = tx.errors.send(FeedError::upstream("synthetic failure")).await;
                    return;
                }

                let price = feed.base_price * (1.0 + spread + rand::random::<f64>() * 0.1e-2);
                let observation = Observation::new(instrument.clone(), Utc::now(), format!("{:.8}", price));
                if tx.prices.send(observation).await.is_err() {
                    return;
                }

                tokio::time::sleep(feed.max_interval.mul_f64(rand::random::<f64>())).await;
            }
        });

        stream
    }
}
