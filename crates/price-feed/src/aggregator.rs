//! Fair price aggregator - fans in multiple feeds on a fixed tick

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use fairprice_core::{CoreResult, FairPriceConfig, Instrument, Observation};
use crate::averager::weighted_average;
use crate::feeds::{PriceFeed, PriceSender, PriceStream};
use crate::state::SourceState;
use crate::worker::SourceWorker;

/// Publishes a freshness-weighted fair price over a set of upstream feeds
///
/// Every `subscribe` starts its own workers and tick task. The first tick
/// without valid data is terminal: the error is sent once and both streams
/// close. The aggregator is itself a [`PriceFeed`], so aggregators compose.
pub struct FairPriceAggregator {
    config: FairPriceConfig,
    sources: Vec<Arc<dyn PriceFeed>>,
    shutdown: CancellationToken,
}

impl FairPriceAggregator {
    /// Fails when `config` does not validate
    pub fn new(config: FairPriceConfig, sources: Vec<Arc<dyn PriceFeed>>) -> CoreResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            sources,
            shutdown: CancellationToken::new(),
        })
    }

    /// Tear down every subscription when `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn config(&self) -> &FairPriceConfig {
        &self.config
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl PriceFeed for FairPriceAggregator {
    /// Must be called from within a tokio runtime
    fn subscribe(&self, instrument: &Instrument) -> PriceStream {
        let cancel = self.shutdown.child_token();

        let states = self
            .sources
            .iter()
            .enumerate()
            .map(|(source, feed)| {
                let worker = SourceWorker::new(source, Arc::clone(feed));
                let state = worker.state();
                tokio::spawn(worker.run(instrument.clone(), cancel.clone()));
                state
            })
            .collect();

        info!(
            %instrument,
            sources = self.sources.len(),
            tick_period = ?self.config.tick_period(),
            expiry = ?self.config.expiry_period(),
            "Starting fair price stream"
        );

        let (tx, stream) = PriceStream::channel(self.config.channel_capacity);
        let ticker = TickLoop {
            instrument: instrument.clone(),
            states,
            tx,
            cancel,
            tick_period: self.config.tick_period(),
            expiry: self.config.expiry_period(),
        };
        tokio::spawn(ticker.run());

        stream
    }
}

/// Time left until the next wall-clock multiple of `period`
///
/// A `now` exactly on a boundary waits a full period.
pub fn delay_until_next_boundary(now: DateTime<Utc>, period: Duration) -> Duration {
    let period_ns = period.as_nanos() as i128;
    if period_ns == 0 {
        return Duration::ZERO;
    }

    let since_epoch = i128::from(now.timestamp()) * 1_000_000_000
        + i128::from(now.timestamp_subsec_nanos());
    let into_period = since_epoch.rem_euclid(period_ns);

    // Below `period`, so the seconds part fits a u64
    period - Duration::new((into_period / 1_000_000_000) as u64, (into_period % 1_000_000_000) as u32)
}

struct TickLoop {
    instrument: Instrument,
    states: Vec<Arc<SourceState>>,
    tx: PriceSender,
    cancel: CancellationToken,
    tick_period: Duration,
    expiry: Duration,
}

impl TickLoop {
    async fn run(self) {
        // First tick lands one period after the next aligned boundary, so
        // sources get at least a full period to report
        let delay = delay_until_next_boundary(Utc::now(), self.tick_period);
        let now = Instant::now();
        let start = now
            .checked_add(delay)
            .and_then(|at| at.checked_add(self.tick_period))
            .unwrap_or(now + self.tick_period);
        let mut interval = time::interval_at(start, self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.tx.prices.closed() => {
                    debug!(instrument = %self.instrument, "Price stream dropped by consumer");
                    break;
                }
                _ = interval.tick() => {}
            }

            if !self.tick().await {
                break;
            }
        }

        // Stops the workers; dropping `tx` closes both streams
        self.cancel.cancel();
        debug!(instrument = %self.instrument, "Fair price stream closed");
    }

    /// Returns false once the stream must end
    async fn tick(&self) -> bool {
        let now = Utc::now();
        let snapshots: Vec<_> = self.states.iter().map(|state| state.snapshot()).collect();

        match weighted_average(snapshots.iter().map(|snapshot| &**snapshot), now, self.expiry) {
            Ok(price) => {
                debug!(
                    instrument = %self.instrument,
                    sources = price.sources,
                    price = %price.value,
                    "Fair price tick"
                );

                let observation = Observation::new(self.instrument.clone(), now, price.formatted());
                tokio::select! {
                    _ = self.cancel.cancelled() => false,
                    sent = self.tx.prices.send(observation) => sent.is_ok(),
                }
            }
            Err(e) => {
                error!(instrument = %self.instrument, "Fair price unavailable: {}", e);
                let _ = self.tx.errors.send(e).await;
                false
            }
        }
    }
}
