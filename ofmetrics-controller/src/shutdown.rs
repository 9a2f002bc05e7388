/**
 * SHUTDOWN HANDLER - final flush of the metrics store
 *
 * ROLE: on the first stop request, signals every background task to stop,
 * waits for them to drain (so no metrics write is cut short), takes one
 * final snapshot and writes it as a JSON document. Later stop requests are
 * no-ops. A failed write is reported and shutdown carries on; there is no
 * retry loop that could hold up process exit.
 */

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::metrics::MetricsStore;
use crate::snapshot::{Metadata, MetricsDocument, SCHEMA_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timestamp formatting error: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Fixed part of the document metadata; the timestamp is filled in at write time.
#[derive(Debug, Clone)]
pub struct MetadataTemplate {
    pub protocol: String,
    pub controller: String,
    pub openflow_version: String,
    pub run_id: Option<String>,
}

impl MetadataTemplate {
    pub fn stamp(&self, generated_at: OffsetDateTime) -> Result<Metadata, PersistError> {
        Ok(Metadata {
            protocol: self.protocol.clone(),
            controller: self.controller.clone(),
            openflow_version: self.openflow_version.clone(),
            timestamp: generated_at.format(&Rfc3339)?,
            schema_version: SCHEMA_VERSION,
            run_id: self.run_id.clone(),
        })
    }
}

pub struct ShutdownHandler {
    metrics: Arc<MetricsStore>,
    path: PathBuf,
    metadata: MetadataTemplate,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl ShutdownHandler {
    pub fn new(metrics: Arc<MetricsStore>, path: impl Into<PathBuf>, metadata: MetadataTemplate) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            metrics,
            path: path.into(),
            metadata,
            stop_tx,
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Stop signal for background tasks; flips to `true` once shutdown starts.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Task to wait for before the final snapshot is taken.
    pub fn register(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Returns `None` when shutdown already ran, otherwise the outcome of the
    /// single persistence attempt.
    pub async fn shutdown(&self) -> Option<Result<PathBuf, PersistError>> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return None;
        }

        self.stop_tx.send_replace(true);
        let tasks = std::mem::take(&mut *self.tasks.lock());
        info!("[shutdown] waiting for {} background tasks", tasks.len());
        for task in tasks {
            if let Err(e) = task.await {
                error!("[shutdown] background task ended abnormally: {}", e);
            }
        }

        let result = self.persist().await;
        match &result {
            Ok(path) => info!("[shutdown] controller stopped, metrics saved to {}", path.display()),
            Err(e) => error!("[shutdown] failed to save metrics: {}", e),
        }
        Some(result)
    }

    async fn persist(&self) -> Result<PathBuf, PersistError> {
        let document = MetricsDocument {
            metadata: self.metadata.stamp(OffsetDateTime::now_utc())?,
            metrics: self.metrics.snapshot(),
        };
        write_document(&self.path, &document).await?;
        Ok(self.path.clone())
    }
}

pub async fn write_document(path: &Path, document: &MetricsDocument) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let content = serde_json::to_string_pretty(document)?;
    tokio::fs::write(path, content).await.map_err(io_err)?;
    Ok(())
}
