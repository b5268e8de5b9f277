//! Runtime operation seam.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What a stage sees of the run it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// Identifier of the current run
    pub run_id: Uuid,
    /// Directory new artifacts are created in
    pub work_dir: &'a Path,
    /// Artifact produced by the most recent stage that produced one
    pub input: Option<&'a Path>,
}

/// Files a stage produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutput {
    /// New newline-delimited JSON artifact handed to the next stage
    pub artifact: Option<PathBuf>,
    /// Other files written for the caller; never chained
    pub generated: Vec<PathBuf>,
}

impl StageOutput {
    /// Output consisting of a single chained artifact.
    #[must_use]
    pub fn artifact(path: PathBuf) -> Self {
        Self {
            artifact: Some(path),
            generated: Vec::new(),
        }
    }
}

/// An executable workflow operation.
///
/// Implementations must treat `ctx.input` as read-only and write results to a
/// fresh artifact.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Run with decoded invocation `params`.
    async fn run(&self, ctx: &StageContext<'_>, params: &Value) -> Result<StageOutput>;
}
