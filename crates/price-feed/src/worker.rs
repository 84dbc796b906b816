//! Source worker: keeps the latest observation from one upstream feed

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fairprice_core::{FeedError, Instrument};
use crate::feeds::{PriceFeed, PriceStream};
use crate::state::SourceState;

/// Wraps one feed subscription and resubscribes forever on failure
///
/// Feed errors are stored in the shared [`SourceState`] and never returned.
/// Resubscription is immediate; there is no backoff.
pub struct SourceWorker {
    source: usize,
    feed: Arc<dyn PriceFeed>,
    state: Arc<SourceState>,
}

impl SourceWorker {
    pub fn new(source: usize, feed: Arc<dyn PriceFeed>) -> Self {
        Self {
            source,
            feed,
            state: Arc::new(SourceState::new()),
        }
    }

    /// Snapshot handle, readable while the worker runs
    pub fn state(&self) -> Arc<SourceState> {
        Arc::clone(&self.state)
    }

    /// Stream from the feed until `cancel` fires
    pub async fn run(self, instrument: Instrument, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            debug!(source = self.source, %instrument, "Subscribing to feed");
            self.state.record_subscription();

            let stream = self.feed.subscribe(&instrument);
            if let Some(error) = self.listen(stream, &cancel).await {
                warn!(source = self.source, %instrument, "Feed error, resubscribing: {}", error);
                self.state.set_error(error);
            }

            tokio::task::yield_now().await;
        }

        debug!(source = self.source, %instrument, "Source worker stopped");
    }

    /// Returns the error that ended the subscription, or `None` on cancellation
    async fn listen(&self, stream: PriceStream, cancel: &CancellationToken) -> Option<FeedError> {
        let PriceStream { mut prices, mut errors } = stream;
        let mut errors_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return None,

                price = prices.recv() => match price {
                    Some(observation) => self.state.set_price(observation),
                    // An error sent just before closing is still buffered
                    None => return Some(errors.try_recv().unwrap_or(FeedError::Closed)),
                },

                error = errors.recv(), if errors_open => match error {
                    Some(error) => return Some(error),
                    None => errors_open = false,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFeed, Step};
    use std::time::Duration;

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_worker_keeps_latest_price() {
        let feed = ScriptedFeed::new(vec![vec![Step::price("100", 0), Step::price("101", 0)]]);
        let worker = SourceWorker::new(0, Arc::new(feed));
        let state = worker.state();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(worker.run("BTC_USD".into(), cancel.clone()));
        wait_for(|| state.stats().observations == 2).await;

        let snapshot = state.snapshot();
        assert_eq!(snapshot.usable_observation().unwrap().price, "101");
        assert_eq!(state.stats().subscriptions, 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_resubscribes_after_error() {
        let feed = ScriptedFeed::new(vec![
            vec![Step::price("100", 0), Step::error("reset")],
            vec![Step::price("105", 0)],
        ]);
        let worker = SourceWorker::new(0, Arc::new(feed));
        let state = worker.state();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(worker.run("BTC_USD".into(), cancel.clone()));
        wait_for(|| state.stats().observations == 2).await;

        let snapshot = state.snapshot();
        assert_eq!(snapshot.usable_observation().unwrap().price, "105");
        assert_eq!(snapshot.last_error, Some(FeedError::upstream("reset")));
        assert_eq!(state.stats().errors, 1);
        assert_eq!(state.stats().subscriptions, 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_treats_closed_feed_as_error() {
        let feed = ScriptedFeed::new(vec![
            vec![Step::price("100", 0), Step::Close],
            vec![],
        ]);
        let worker = SourceWorker::new(3, Arc::new(feed));
        let state = worker.state();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(worker.run("BTC_USD".into(), cancel.clone()));
        wait_for(|| state.stats().subscriptions >= 2).await;

        let snapshot = state.snapshot();
        assert_eq!(snapshot.last_error, Some(FeedError::Closed));
        assert!(snapshot.usable_observation().is_none());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_keeps_error_sent_before_close() {
        let feed = ScriptedFeed::new(vec![
            vec![Step::price("100", 0), Step::error("boom"), Step::Close],
            vec![],
        ]);
        let worker = SourceWorker::new(0, Arc::new(feed));
        let state = worker.state();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(worker.run("BTC_USD".into(), cancel.clone()));
        wait_for(|| state.stats().subscriptions >= 2).await;

        let snapshot = state.snapshot();
        assert_eq!(snapshot.last_error, Some(FeedError::upstream("boom")));
        assert!(snapshot.usable_observation().is_none());
        assert_eq!(state.stats().errors, 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_stops_on_cancel() {
        let feed = ScriptedFeed::new(vec![vec![]]);
        let worker = SourceWorker::new(0, Arc::new(feed));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(worker.run("BTC_USD".into(), cancel.clone()));
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
