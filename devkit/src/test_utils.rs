/*!
Test harness for the controller.

Wires a [`Controller`] to a [`MockTransport`] and a fresh metrics store,
and offers the checks every scenario needs: metrics consistency, event
loop runs with a clean stop, and persisting a document for the analyzer.
*/

use crate::mock_transport::MockTransport;
use anyhow::Result;
use ofmetrics_controller::controller::{ControllerSettings, EventOutcome};
use ofmetrics_controller::shutdown::{MetadataTemplate, ShutdownHandler};
use ofmetrics_controller::snapshot::{Category, MetricsSnapshot};
use ofmetrics_controller::{Controller, ControllerError, MetricsStore, SwitchEvent};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub struct TestHarness {
    pub transport: Arc<MockTransport>,
    pub metrics: Arc<MetricsStore>,
    pub controller: Controller,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok();

        let transport = Arc::new(MockTransport::new());
        let metrics = Arc::new(MetricsStore::new());
        let controller = Controller::new(transport.clone(), metrics.clone(), ControllerSettings::default());
        Self { transport, metrics, controller }
    }

    /// Handle events one by one on the calling thread.
    pub fn feed(&self, events: impl IntoIterator<Item = SwitchEvent>) -> Vec<Result<EventOutcome, ControllerError>> {
        events.into_iter().map(|e| self.controller.handle_event(e)).collect()
    }

    /// Push events through the async event loop and wait until every one of
    /// them has been handled.
    pub async fn run_events(&self, events: Vec<SwitchEvent>) -> Result<()> {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let controller = self.controller.clone();
        let event_loop = tokio::spawn(async move { controller.run(rx, stop_rx).await });

        for event in events {
            tx.send(event).await?;
        }
        drop(tx);
        event_loop.await?;
        log::info!("[harness] event loop drained");
        Ok(())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Every category must have as many timestamps and sizes as its count,
    /// and no negative latency.
    pub fn assert_consistent(&self) -> Result<()> {
        let snapshot = self.snapshot();
        for category in Category::ALL {
            let record = snapshot.category(category);
            let count = record.count as usize;
            if record.timestamps.len() != count || record.sizes.len() != count {
                anyhow::bail!(
                    "category {} is torn: count={} timestamps={} sizes={}",
                    category,
                    count,
                    record.timestamps.len(),
                    record.sizes.len()
                );
            }
            if let Some(bad) = record.latencies().iter().find(|l| **l < 0.0 || !l.is_finite()) {
                anyhow::bail!("category {} has invalid latency {}", category, bad);
            }
        }
        Ok(())
    }

    /// Shutdown handler writing to `path`, with the default TCP metadata.
    pub fn shutdown_handler(&self, path: &Path) -> ShutdownHandler {
        let metadata = MetadataTemplate {
            protocol: "TCP".into(),
            controller: "ofmetrics".into(),
            openflow_version: "1.3".into(),
            run_id: Some("harness".into()),
        };
        ShutdownHandler::new(self.metrics.clone(), path, metadata)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
