//! JSON report written at the end of an evaluation run.

use crate::error::Result;
use crate::eval::aggregate::ResultMap;
use crate::eval::metrics::MetricsSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What was run, against what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub generated_at: DateTime<Utc>,
    pub model: String,
    pub top_k: usize,
    pub batch_size: usize,
    pub corpus_size: usize,
    pub query_count: usize,
    pub embedding_dim: usize,
    /// SHA-256 over the corpus ids and texts
    pub corpus_fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub run: RunInfo,
    /// Absent when no query carried relevance judgments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSummary>,
    pub results: ResultMap,
}

impl EvalReport {
    /// Pretty-printed JSON, creating parent directories as needed.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::RagvalError::Parse(format!("Failed to serialise report: {}", e)))?;
        std::fs::write(path, json)?;
        log::info!("Wrote evaluation report to {}", path.display());
        Ok(())
    }
}
