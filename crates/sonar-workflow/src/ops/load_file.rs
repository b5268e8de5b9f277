//! `load_file`: bring an existing record file into the run.

use crate::artifact;
use crate::error::Result;
use crate::operation::{Operation, StageContext, StageOutput};
use crate::plan::{DslCall, Invocation};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

pub(crate) const NAME: &str = "load_file";

#[derive(Debug, Deserialize)]
struct LoadParams {
    file: PathBuf,
}

/// `load(file)`
pub(crate) fn translate(call: &DslCall) -> Result<Invocation> {
    let file = call.str_arg(0, "file")?;
    Ok(Invocation::new(NAME, json!({ "file": file })))
}

/// Copies a newline-delimited JSON file into the work directory, so the run
/// owns (and later deletes) its copy rather than the caller's file.
pub struct LoadFile;

#[async_trait]
impl Operation for LoadFile {
    async fn run(&self, ctx: &StageContext<'_>, params: &Value) -> Result<StageOutput> {
        let params: LoadParams = serde_json::from_value(params.clone())?;
        let work_dir = ctx.work_dir.to_path_buf();
        let source = params.file.clone();
        let path = artifact::blocking(move || artifact::import(&work_dir, &source)).await?;
        tracing::debug!(source = %params.file.display(), copy = %path.display(), "loaded file");
        Ok(StageOutput::artifact(path))
    }
}
