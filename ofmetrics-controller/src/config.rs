use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::controller::ControllerSettings;
use crate::shutdown::MetadataTemplate;

pub const CONFIG_ENV: &str = "OFMETRICS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "controller.yaml";
/// One day; longer periods would never report during a run anyway.
const MAX_REPORT_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Seconds between two live summaries.
    pub report_interval_secs: u64,
    pub metrics_path: PathBuf,
    /// Transport framing bytes charged per message (20 = TCP header).
    pub header_bytes: u64,
    pub protocol: String,
    pub controller_label: String,
    pub openflow_version: String,
    pub event_queue_depth: usize,
    /// JSON-lines event file; stdin when absent.
    pub replay_path: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 30,
            metrics_path: PathBuf::from("./data/tcp_baseline_metrics.json"),
            header_bytes: 20,
            protocol: "TCP".into(),
            controller_label: "ofmetrics".into(),
            openflow_version: "1.3".into(),
            event_queue_depth: 1024,
            replay_path: None,
        }
    }
}

impl ControllerConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.clamp(1, MAX_REPORT_INTERVAL_SECS))
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings { header_bytes: self.header_bytes }
    }

    pub fn metadata(&self, run_id: Option<String>) -> MetadataTemplate {
        MetadataTemplate {
            protocol: self.protocol.clone(),
            controller: self.controller_label.clone(),
            openflow_version: self.openflow_version.clone(),
            run_id,
        }
    }
}

pub fn parse_config(txt: &str) -> Result<ControllerConfig, serde_yaml::Error> {
    if txt.trim().is_empty() {
        return Ok(ControllerConfig::default());
    }
    serde_yaml::from_str(txt)
}

/// Load the YAML config named by `OFMETRICS_CONFIG` (default `controller.yaml`).
/// A missing or invalid file falls back to defaults.
pub async fn load_config() -> ControllerConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    if !Path::new(&path).exists() {
        warn!("[config] no {path}, using defaults");
        return ControllerConfig::default();
    }
    let txt = fs::read_to_string(&path).await.unwrap_or_default();
    parse_config(&txt).unwrap_or_else(|e| {
        warn!("[config] invalid {path}: {e}");
        ControllerConfig::default()
    })
}
