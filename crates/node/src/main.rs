//! Fair price node
//!
//! Subscribes an aggregator to a set of synthetic feeds and prints every
//! fair price tick to stdout.

mod config;
mod synthetic;

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fairprice_core::{FairPriceConfig, Instrument, Observation};
use fairprice_feed::{FairPriceAggregator, PriceFeed, PriceStream};

use crate::config::{LogFormat, NodeConfig, OutputFormat};
use crate::synthetic::RandomWalkFeed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let node = NodeConfig::from_env()?;
    init_logging(node.log_format);

    info!("Starting fair price node v{}", env!("CARGO_PKG_VERSION"));

    let config = FairPriceConfig::from_env()?;
    info!(
        instrument = %node.instrument,
        sources = node.sources,
        tick_period_ms = config.tick_period_ms,
        expiry_multiple = config.expiry_multiple,
        "Configuration loaded"
    );

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let feeds: Vec<Arc<dyn PriceFeed>> = (0..node.sources)
        .map(|_| {
            let feed = RandomWalkFeed::new(node.base_price, node.max_emit_interval())
                .with_failure_rate(node.failure_rate);
            Arc::new(feed) as Arc<dyn PriceFeed>
        })
        .collect();

    let aggregator = FairPriceAggregator::new(config, feeds)?.with_shutdown(shutdown);
    let PriceStream { mut prices, mut errors } =
        aggregator.subscribe(&Instrument::new(node.instrument.clone()));

    loop {
        tokio::select! {
            Some(observation) = prices.recv() => print_observation(&observation, node.output)?,
            Some(e) = errors.recv() => {
                error!("Fair price stream failed: {}", e);
                return Err(e.into());
            }
            else => break,
        }
    }

    info!("Fair price stream closed");
    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        shutdown.cancel();
    });
}

fn print_observation(observation: &Observation, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            let local = observation.timestamp.with_timezone(&chrono::Local);
            println!(
                "{}\t{}\t{}",
                observation.instrument,
                local.format("%Y-%m-%d %H:%M:%S"),
                observation.price
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(observation)?),
    }
    Ok(())
}
