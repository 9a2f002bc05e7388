/**
 * OFMETRICS CONTROLLER - replay-driven entry point
 *
 * ROLE: wires the metrics store, controller core, live reporter and shutdown
 * handler together, then feeds decoded switch events (JSON lines from
 * `replay_path` or stdin) into the event loop. End of input or Ctrl-C stops
 * the controller and writes the metrics document once.
 */

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

use ofmetrics_controller::config::load_config;
use ofmetrics_controller::logging::init_logging;
use ofmetrics_controller::replay::feed_events;
use ofmetrics_controller::reporter::Reporter;
use ofmetrics_controller::shutdown::ShutdownHandler;
use ofmetrics_controller::transport::LoggingTransport;
use ofmetrics_controller::{Controller, MetricsStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging().context("Failed to initialize logging")?;

    let cfg = load_config().await;
    let run_id = uuid::Uuid::new_v4().to_string();
    info!("{}", "=".repeat(70));
    info!("OFMETRICS CONTROLLER STARTED (run {run_id})");
    info!("{}", "=".repeat(70));

    let metrics = Arc::new(MetricsStore::new());
    let controller = Controller::new(Arc::new(LoggingTransport), metrics.clone(), cfg.controller_settings());
    let shutdown = ShutdownHandler::new(metrics.clone(), cfg.metrics_path.clone(), cfg.metadata(Some(run_id)));

    let (events_tx, events_rx) = mpsc::channel(cfg.event_queue_depth.max(1));
    let stop = shutdown.subscribe();
    let event_loop = controller.clone();
    shutdown.register(tokio::spawn(async move { event_loop.run(events_rx, stop).await }));
    shutdown.register(Reporter::new(metrics.clone(), cfg.report_interval()).spawn(shutdown.subscribe()));

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &cfg.replay_path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open replay file {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    tokio::select! {
        fed = feed_events(reader, events_tx) => match fed {
            Ok(stats) => info!("[main] event feed finished: {} delivered, {} rejected", stats.delivered, stats.rejected),
            Err(e) => error!("[main] event feed failed: {e}"),
        },
        _ = tokio::signal::ctrl_c() => info!("[main] stop signal received"),
    }

    if let Some(Err(e)) = shutdown.shutdown().await {
        error!("[main] metrics were not persisted: {e}");
    }
    Ok(())
}
