use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use ofmetrics_controller::snapshot::{MetricsDocument, SCHEMA_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("cannot read metrics file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode metrics document: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_document(path: &Path) -> Result<MetricsDocument, AnalyzerError> {
    let txt = std::fs::read_to_string(path).map_err(|source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("[analyzer] loaded {} bytes from {}", txt.len(), path.display());
    parse_document(&txt)
}

/// Decode a document. Keys that are absent load as empty sections.
pub fn parse_document(txt: &str) -> Result<MetricsDocument, AnalyzerError> {
    let doc: MetricsDocument = serde_json::from_str(txt)?;
    if doc.metadata.schema_version > SCHEMA_VERSION {
        warn!(
            "[analyzer] document schema v{} is newer than v{}, unknown sections are ignored",
            doc.metadata.schema_version, SCHEMA_VERSION
        );
    }
    Ok(doc)
}
