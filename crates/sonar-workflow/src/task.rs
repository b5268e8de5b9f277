//! Provenance records for executed stages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Audit record of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    /// Operation that ran
    pub operation: String,
    /// Parameters it ran with, serialized as JSON
    pub params: String,
    /// Artifact it produced, if any
    pub output: Option<PathBuf>,
    /// Additional files it wrote
    pub generated: Vec<PathBuf>,
    /// When the stage started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl TaskRecord {
    /// Every file this stage left on disk.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.output.iter().chain(self.generated.iter())
    }
}
