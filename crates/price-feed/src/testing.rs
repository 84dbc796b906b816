//! Scripted feed used by the worker and aggregator tests

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fairprice_core::{FeedError, Instrument, Observation};
use crate::feeds::{PriceFeed, PriceStream};

#[derive(Debug, Clone)]
pub enum Step {
    /// Price stamped `age_secs` before the moment it is sent
    Price { price: String, age_secs: i64 },
    Error(String),
    Sleep(Duration),
    /// Close both channels
    Close,
}

impl Step {
    pub fn price(price: &str, age_secs: i64) -> Self {
        Step::Price {
            price: price.to_string(),
            age_secs,
        }
    }

    pub fn error(message: &str) -> Self {
        Step::Error(message.to_string())
    }

    pub fn sleep_ms(ms: u64) -> Self {
        Step::Sleep(Duration::from_millis(ms))
    }
}

/// Plays one script per subscription, then keeps the stream open and idle
///
/// Once the scripts run out every further subscription is idle too.
pub struct ScriptedFeed {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    subscriptions: AtomicUsize,
    active: Arc<AtomicUsize>,
}

impl ScriptedFeed {
    pub fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            subscriptions: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Total `subscribe` calls so far
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Streams whose subscriber still holds the receiving end
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements the active count when a script task ends
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PriceFeed for ScriptedFeed {
    fn subscribe(&self, instrument: &Instrument) -> PriceStream {
        let script = self.scripts.lock().pop_front().unwrap_or_default();
        let (tx, stream) = PriceStream::channel(1);
        let instrument = instrument.clone();

        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));

        tokio::spawn(async move {
            let _guard = guard;
            for step in script {
                match step {
                    Step::Price { price, age_secs } => {
                        let at = Utc::now() - chrono::Duration::seconds(age_secs);
                        let observation = Observation::new(instrument.clone(), at, price);
                        if tx.prices.send(observation).await.is_err() {
                            return;
                        }
                    }
                    Step::Error(message) => {
                        if tx.errors.send(FeedError::Upstream(message)).await.is_err() {
                            return;
                        }
                    }
                    Step::Sleep(duration) => tokio::time::sleep(duration).await,
                    Step::Close => return,
                }
            }

            tx.prices.closed().await;
        });

        stream
    }
}
