//! Price feed capability

use std::sync::Arc;
use tokio::sync::mpsc;

use fairprice_core::{FeedError, Instrument, Observation};

/// Live subscription to one feed: observations and errors on separate channels
///
/// Dropping the receivers ends the subscription from the consumer side.
#[derive(Debug)]
pub struct PriceStream {
    pub prices: mpsc::Receiver<Observation>,
    pub errors: mpsc::Receiver<FeedError>,
}

impl PriceStream {
    /// Create a stream together with the senders that feed it
    pub fn channel(capacity: usize) -> (PriceSender, PriceStream) {
        let (prices_tx, prices) = mpsc::channel(capacity);
        let (errors_tx, errors) = mpsc::channel(capacity);

        (
            PriceSender {
                prices: prices_tx,
                errors: errors_tx,
            },
            PriceStream { prices, errors },
        )
    }
}

/// Producer half of a [`PriceStream`]
#[derive(Debug, Clone)]
pub struct PriceSender {
    pub prices: mpsc::Sender<Observation>,
    pub errors: mpsc::Sender<FeedError>,
}

/// Anything that can stream prices for an instrument
///
/// A feed may emit any interleaving of observations and errors. Closing the
/// observation channel means the feed has ended.
pub trait PriceFeed: Send + Sync {
    fn subscribe(&self, instrument: &Instrument) -> PriceStream;
}

impl<T: PriceFeed + ?Sized> PriceFeed for Arc<T> {
    fn subscribe(&self, instrument: &Instrument) -> PriceStream {
        (**self).subscribe(instrument)
    }
}

impl<T: PriceFeed + ?Sized> PriceFeed for Box<T> {
    fn subscribe(&self, instrument: &Instrument) -> PriceStream {
        (**self).subscribe(instrument)
    }
}
