//! Persisted metrics document.
//!
//! This is the only interchange format between the live controller and the
//! offline analyzer. Keys follow the historical `tcp_baseline_metrics.json`
//! layout; every field has a serde default so sparse documents still load.
//! New optional categories may be added, but existing keys must not be renamed
//! or removed without bumping [`SCHEMA_VERSION`].

use serde::{Deserialize, Serialize};

use crate::models::SwitchId;

/// Version of the document layout written in `metadata.schema_version`.
pub const SCHEMA_VERSION: u32 = 1;

/// Message categories tracked by the metrics store, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PacketIn,
    FlowMod,
    PacketOut,
    Hello,
    FeaturesRequest,
    FeaturesReply,
    EchoRequest,
    EchoReply,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::PacketIn,
        Category::FlowMod,
        Category::PacketOut,
        Category::Hello,
        Category::FeaturesRequest,
        Category::FeaturesReply,
        Category::EchoRequest,
        Category::EchoReply,
    ];

    /// Document key for this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::PacketIn => "packet_in",
            Category::FlowMod => "flow_mod",
            Category::PacketOut => "packet_out",
            Category::Hello => "hello",
            Category::FeaturesRequest => "features_request",
            Category::FeaturesReply => "features_reply",
            Category::EchoRequest => "echo_request",
            Category::EchoReply => "echo_reply",
        }
    }

    /// Human label used in log summaries and reports.
    pub fn label(self) -> &'static str {
        match self {
            Category::PacketIn => "Packet-In",
            Category::FlowMod => "Flow-Mod",
            Category::PacketOut => "Packet-Out",
            Category::Hello => "Hello",
            Category::FeaturesRequest => "Features-Request",
            Category::FeaturesReply => "Features-Reply",
            Category::EchoRequest => "Echo-Request",
            Category::EchoReply => "Echo-Reply",
        }
    }

    /// Only packet-in (end-to-end) and flow-mod (dispatch) carry latency samples.
    pub fn tracks_latency(self) -> bool {
        matches!(self, Category::PacketIn | Category::FlowMod)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category sample sequences. `count`, `timestamps` and `sizes` always
/// move together; `latencies` is only present for latency-tracking categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub timestamps: Vec<f64>,
    #[serde(default)]
    pub sizes: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latencies: Option<Vec<f64>>,
}

impl CategoryRecord {
    pub fn for_category(category: Category) -> Self {
        Self {
            latencies: category.tracks_latency().then(Vec::new),
            ..Self::default()
        }
    }

    pub fn latencies(&self) -> &[f64] {
        self.latencies.as_deref().unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// One entry per switch-connect event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub dpid: SwitchId,
    /// Seconds since the Unix epoch, same clock as the category timestamps.
    pub timestamp: f64,
    /// ISO-8601 rendering of `timestamp`.
    pub datetime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    #[serde(default)]
    pub established: Vec<ConnectionEntry>,
    /// Milliseconds from controller start to the first switch connection.
    #[serde(default)]
    pub establishment_times: Vec<f64>,
    #[serde(default)]
    pub active_connections: u64,
}

/// Running byte totals for control-channel framing versus message payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverheadTotals {
    #[serde(default)]
    pub total_headers: u64,
    #[serde(default)]
    pub payload: u64,
}

impl OverheadTotals {
    /// Wide enough for any pair of loaded totals.
    pub fn total(&self) -> u128 {
        u128::from(self.total_headers) + u128::from(self.payload)
    }

    /// Header share of all bytes, in percent. `None` until any byte is counted.
    pub fn percentage(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some((self.total_headers as f64 * 100.0 / total as f64).min(100.0)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub packet_in: CategoryRecord,
    #[serde(default)]
    pub flow_mod: CategoryRecord,
    #[serde(default)]
    pub packet_out: CategoryRecord,
    #[serde(default)]
    pub hello: CategoryRecord,
    #[serde(default)]
    pub features_request: CategoryRecord,
    #[serde(default)]
    pub features_reply: CategoryRecord,
    #[serde(default)]
    pub echo_request: CategoryRecord,
    #[serde(default)]
    pub echo_reply: CategoryRecord,
    #[serde(default)]
    pub connection: ConnectionMetrics,
    #[serde(default)]
    pub overhead: OverheadTotals,
}

impl MetricsSnapshot {
    /// Empty snapshot with latency vectors allocated where they apply.
    pub fn new() -> Self {
        Self {
            packet_in: CategoryRecord::for_category(Category::PacketIn),
            flow_mod: CategoryRecord::for_category(Category::FlowMod),
            ..Self::default()
        }
    }

    pub fn category(&self, category: Category) -> &CategoryRecord {
        match category {
            Category::PacketIn => &self.packet_in,
            Category::FlowMod => &self.flow_mod,
            Category::PacketOut => &self.packet_out,
            Category::Hello => &self.hello,
            Category::FeaturesRequest => &self.features_request,
            Category::FeaturesReply => &self.features_reply,
            Category::EchoRequest => &self.echo_request,
            Category::EchoReply => &self.echo_reply,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut CategoryRecord {
        match category {
            Category::PacketIn => &mut self.packet_in,
            Category::FlowMod => &mut self.flow_mod,
            Category::PacketOut => &mut self.packet_out,
            Category::Hello => &mut self.hello,
            Category::FeaturesRequest => &mut self.features_request,
            Category::FeaturesReply => &mut self.features_reply,
            Category::EchoRequest => &mut self.echo_request,
            Category::EchoReply => &mut self.echo_reply,
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Header written above the metrics section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub controller: String,
    #[serde(default)]
    pub openflow_version: String,
    /// RFC 3339 generation time.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            protocol: String::new(),
            controller: String::new(),
            openflow_version: String::new(),
            timestamp: String::new(),
            schema_version: SCHEMA_VERSION,
            run_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsDocument {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_keys_match_persisted_layout() {
        let mut snapshot = MetricsSnapshot::new();
        snapshot.overhead = OverheadTotals { total_headers: 20, payload: 80 };
        let doc = MetricsDocument { metadata: Metadata::default(), metrics: snapshot };

        let value = serde_json::to_value(&doc).unwrap();
        assert!(value["metrics"]["packet_in"]["latencies"].is_array());
        assert!(value["metrics"]["packet_out"].get("latencies").is_none());
        assert_eq!(value["metrics"]["overhead"]["total_headers"], 20);
        assert_eq!(value["metrics"]["overhead"]["payload"], 80);
        assert_eq!(value["metrics"]["connection"]["active_connections"], 0);
        assert_eq!(value["metadata"]["schema_version"], SCHEMA_VERSION);
    }

    #[test]
    fn test_sparse_document_loads_with_defaults() {
        let doc: MetricsDocument = serde_json::from_str(
            r#"{"metrics": {"packet_in": {"latencies": [1.5]}, "future_category": {"count": 3}}}"#,
        )
        .unwrap();

        assert_eq!(doc.metrics.packet_in.latencies(), &[1.5]);
        assert!(doc.metrics.flow_mod.latencies().is_empty());
        assert!(doc.metrics.packet_out.is_empty());
        assert_eq!(doc.metadata.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_overhead_percentage() {
        assert_eq!(OverheadTotals::default().percentage(), None);
        let totals = OverheadTotals { total_headers: 20, payload: 80 };
        assert_eq!(totals.total(), 100);
        assert!((totals.percentage().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_overhead_totals_near_u64_max() {
        let totals = OverheadTotals { total_headers: u64::MAX, payload: 1 };
        assert_eq!(totals.total(), u128::from(u64::MAX) + 1);
        let pct = totals.percentage().unwrap();
        assert!(pct > 99.0 && pct <= 100.0);
    }

    #[test]
    fn test_category_keys() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
        assert!(Category::PacketIn.tracks_latency());
        assert!(!Category::PacketOut.tracks_latency());
    }
}
