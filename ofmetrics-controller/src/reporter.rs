use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval_at, Instant};
use tracing::info;

use crate::metrics::MetricsStore;
use crate::snapshot::MetricsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyBrief {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl LatencyBrief {
    fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let sum: f64 = samples.iter().sum();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { avg: sum / samples.len() as f64, min, max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverheadBrief {
    pub headers: u64,
    pub payload: u64,
    pub percentage: f64,
}

/// Live summary computed from one snapshot. Sections without samples are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub packet_in_count: u64,
    pub packet_in_latency: Option<LatencyBrief>,
    pub flow_mod_count: u64,
    pub flow_mod_avg_latency: Option<f64>,
    pub packet_out_count: u64,
    pub active_connections: u64,
    pub overhead: Option<OverheadBrief>,
}

impl Summary {
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        let overhead = snapshot.overhead.percentage().map(|percentage| OverheadBrief {
            headers: snapshot.overhead.total_headers,
            payload: snapshot.overhead.payload,
            percentage,
        });
        Self {
            packet_in_count: snapshot.packet_in.count,
            packet_in_latency: LatencyBrief::from_samples(snapshot.packet_in.latencies()),
            flow_mod_count: snapshot.flow_mod.count,
            flow_mod_avg_latency: LatencyBrief::from_samples(snapshot.flow_mod.latencies()).map(|l| l.avg),
            packet_out_count: snapshot.packet_out.count,
            active_connections: snapshot.connection.active_connections,
            overhead,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec!["[PACKET-IN]".to_string(), format!("  - Total Count: {}", self.packet_in_count)];
        if let Some(latency) = &self.packet_in_latency {
            lines.push(format!("  - Avg Latency: {:.3} ms", latency.avg));
            lines.push(format!("  - Min Latency: {:.3} ms", latency.min));
            lines.push(format!("  - Max Latency: {:.3} ms", latency.max));
        }

        lines.push("[FLOW-MOD]".to_string());
        lines.push(format!("  - Total Count: {}", self.flow_mod_count));
        if let Some(avg) = self.flow_mod_avg_latency {
            lines.push(format!("  - Avg Latency: {:.3} ms", avg));
        }

        lines.push("[PACKET-OUT]".to_string());
        lines.push(format!("  - Total Count: {}", self.packet_out_count));
        lines.push(format!("[CONNECTIONS] active: {}", self.active_connections));

        if let Some(overhead) = &self.overhead {
            lines.push("[OVERHEAD]".to_string());
            lines.push(format!("  - Headers: {} bytes", overhead.headers));
            lines.push(format!("  - Payload: {} bytes", overhead.payload));
            lines.push(format!("  - Overhead: {:.2}%", overhead.percentage));
        }
        lines
    }
}

/// Periodic summary logger. Reads snapshots only, never writes to the store.
pub struct Reporter {
    metrics: Arc<MetricsStore>,
    period: Duration,
}

impl Reporter {
    pub fn new(metrics: Arc<MetricsStore>, period: Duration) -> Self {
        Self { metrics, period }
    }

    pub fn report(&self) -> Summary {
        let summary = Summary::from_snapshot(&self.metrics.snapshot());
        info!("{}", "=".repeat(70));
        info!("CONTROLLER METRICS SUMMARY");
        for line in summary.lines() {
            info!("{}", line);
        }
        info!("{}", "=".repeat(70));
        summary
    }

    /// Tick every `period` until `stop` flips to true (or its sender goes away).
    pub fn spawn(self, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        task::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.report();
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            info!("[reporter] stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MessageRecord;
    use crate::snapshot::Category;

    #[test]
    fn test_empty_snapshot_has_no_optional_sections() {
        let summary = Summary::from_snapshot(&MetricsSnapshot::new());
        assert_eq!(summary.packet_in_count, 0);
        assert!(summary.packet_in_latency.is_none());
        assert!(summary.flow_mod_avg_latency.is_none());
        assert!(summary.overhead.is_none());
        assert!(!summary.lines().iter().any(|l| l.contains("Latency") || l.contains("OVERHEAD")));
    }

    #[test]
    fn test_summary_values() {
        let store = MetricsStore::new();
        let ts = store.clock().now();
        store.record(MessageRecord::new(Category::PacketIn, ts, 100).unwrap());
        store.record_latency(Category::PacketIn, 1.0).unwrap();
        store.record_latency(Category::PacketIn, 3.0).unwrap();
        store.add_overhead(20, 80);

        let summary = Summary::from_snapshot(&store.snapshot());
        assert_eq!(summary.packet_in_latency, Some(LatencyBrief { avg: 2.0, min: 1.0, max: 3.0 }));
        assert_eq!(summary.overhead.map(|o| o.percentage), Some(20.0));
    }

    #[tokio::test]
    async fn test_reporter_ticks_until_stopped() {
        let metrics = Arc::new(MetricsStore::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Reporter::new(metrics.clone(), Duration::from_millis(20)).spawn(stop_rx);

        tokio::time::sleep(Duration::from_millis(70)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::new());
    }
}
