/**
 * REPORT - fixed-layout text report over one metrics document
 *
 * ROLE: runs every analysis over a loaded document and renders the result
 * with a fixed section order and fixed field order. Nothing in the output
 * depends on the time of analysis, so rendering the same document twice
 * gives byte-identical text and reports diff cleanly across runs.
 *
 * SECTIONS: latency (packet-in end-to-end, flow-mod dispatch), throughput,
 * overhead, connections. A section without samples prints "no data".
 */

use serde::Serialize;
use std::fmt::Write;

use ofmetrics_controller::snapshot::{Category, Metadata, MetricsDocument};

use crate::distribution::{latency_distributions, LatencyDistribution};
use crate::latency::LatencyStats;
use crate::overhead::OverheadStats;
use crate::throughput::{Throughput, ThroughputSummary};

pub const NO_DATA: &str = "no data";
const RULE_WIDTH: usize = 70;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSummary {
    pub switches: usize,
    pub active: u64,
    pub first_establishment_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub metadata: Metadata,
    /// Latency-tracking categories in report order.
    pub latency: Vec<(Category, Option<LatencyStats>)>,
    pub throughput: ThroughputSummary,
    pub overhead: Option<OverheadStats>,
    pub connections: Option<ConnectionSummary>,
}

pub fn analyze(document: &MetricsDocument) -> Analysis {
    let metrics = &document.metrics;
    let latency = Category::ALL
        .iter()
        .filter(|c| c.tracks_latency())
        .map(|&c| (c, LatencyStats::from_samples(metrics.category(c).latencies())))
        .collect();

    let conn = &metrics.connection;
    let connections = (!conn.established.is_empty() || conn.active_connections > 0).then(|| ConnectionSummary {
        switches: conn.established.len(),
        active: conn.active_connections,
        first_establishment_ms: conn.establishment_times.first().copied(),
    });

    Analysis {
        metadata: document.metadata.clone(),
        latency,
        throughput: ThroughputSummary::from_snapshot(metrics),
        overhead: OverheadStats::from_totals(&metrics.overhead),
        connections,
    }
}

/// Distribution data for a document, see [`latency_distributions`].
pub fn distributions(document: &MetricsDocument, bins: usize) -> Vec<LatencyDistribution> {
    latency_distributions(&document.metrics, bins)
}

fn latency_title(category: Category) -> String {
    match category {
        Category::PacketIn => "LATENCY STATISTICS (Packet-In to Flow-Mod)".to_string(),
        Category::FlowMod => "LATENCY STATISTICS (Flow-Mod Send Time)".to_string(),
        other => format!("LATENCY STATISTICS ({})", other.label()),
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl Analysis {
    pub fn render(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let thin = "-".repeat(RULE_WIDTH);
        let mut out = String::new();
        let meta = &self.metadata;

        let title = match meta.protocol.as_str() {
            "" => "BASELINE PERFORMANCE REPORT".to_string(),
            protocol => format!("{} BASELINE PERFORMANCE REPORT", protocol.to_uppercase()),
        };
        // writeln! into a String cannot fail
        let _ = writeln!(out, "{rule}\n{title}\n{rule}");
        let _ = writeln!(out, "Generated: {}", or_unknown(&meta.timestamp));
        let _ = writeln!(out, "Protocol: {}", or_unknown(&meta.protocol));
        let _ = writeln!(out, "Controller: {}", or_unknown(&meta.controller));
        let _ = writeln!(out, "OpenFlow Version: {}", or_unknown(&meta.openflow_version));
        let _ = writeln!(out, "Schema Version: {}", meta.schema_version);
        if let Some(run_id) = &meta.run_id {
            let _ = writeln!(out, "Run: {run_id}");
        }

        for (category, stats) in &self.latency {
            let _ = writeln!(out, "\n{}\n{thin}", latency_title(*category));
            match stats {
                Some(s) => {
                    let _ = writeln!(out, "Sample Count: {}", group_thousands(s.count as u128));
                    let _ = writeln!(out, "Mean:         {:.3} ms", s.mean);
                    let _ = writeln!(out, "Median:       {:.3} ms", s.median);
                    let _ = writeln!(out, "Std Dev:      {:.3} ms", s.std_dev);
                    let _ = writeln!(out, "Min:          {:.3} ms", s.min);
                    let _ = writeln!(out, "Max:          {:.3} ms", s.max);
                    let _ = writeln!(out, "95th %ile:    {:.3} ms", s.p95);
                    let _ = writeln!(out, "99th %ile:    {:.3} ms", s.p99);
                }
                None => {
                    let _ = writeln!(out, "{NO_DATA}");
                }
            }
        }

        let _ = writeln!(out, "\nTHROUGHPUT\n{thin}");
        if self.throughput.is_empty() {
            let _ = writeln!(out, "{NO_DATA}");
        } else {
            for (category, throughput) in &self.throughput.categories {
                let label = format!("{}:", category.label());
                let value = match throughput {
                    Throughput::NoData => NO_DATA.to_string(),
                    Throughput::Undefined { count } => format!("undefined ({} samples)", group_thousands(*count as u128)),
                    Throughput::Rate { per_sec, .. } => format!("{per_sec:.2} msg/sec"),
                };
                let _ = writeln!(out, "{label:<18}{value}");
            }
            if let Some(duration) = self.throughput.total_duration_secs {
                let _ = writeln!(out, "{:<18}{duration:.2} seconds", "Total Duration:");
            }
        }

        let _ = writeln!(out, "\nOVERHEAD\n{thin}");
        match &self.overhead {
            Some(o) => {
                let _ = writeln!(out, "Headers:          {} bytes", group_thousands(o.headers.into()));
                let _ = writeln!(out, "Payload:          {} bytes", group_thousands(o.payload.into()));
                let _ = writeln!(out, "Total:            {} bytes", group_thousands(o.total));
                let _ = writeln!(out, "Overhead:         {:.2}%", o.percentage);
            }
            None => {
                let _ = writeln!(out, "{NO_DATA}");
            }
        }

        let _ = writeln!(out, "\nCONNECTIONS\n{thin}");
        match &self.connections {
            Some(c) => {
                let _ = writeln!(out, "Switches Seen:    {}", c.switches);
                let _ = writeln!(out, "Active:           {}", c.active);
                if let Some(ms) = c.first_establishment_ms {
                    let _ = writeln!(out, "First Connect:    {ms:.3} ms after start");
                }
            }
            None => {
                let _ = writeln!(out, "{NO_DATA}");
            }
        }
        let _ = writeln!(out, "\n{rule}");
        out
    }
}
