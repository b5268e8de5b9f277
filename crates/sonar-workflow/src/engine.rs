//! Sequential workflow execution with artifact chaining.
//!
//! Each stage receives the artifact of the most recent stage that produced
//! one. A failing stage aborts the run; stages already completed keep their
//! records and artifacts. Artifacts stay on disk until [`WorkflowEngine::close`].

use crate::error::{Result, WorkflowError};
use crate::operation::StageContext;
use crate::plan::{DslCall, Invocation};
use crate::registry::FunctionRegistry;
use crate::task::TaskRecord;
use chrono::Utc;
use serde::Serialize;
use sonar_core::WorkflowConfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of a run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Not started
    Idle,
    /// Executing stages
    Running,
    /// Every stage succeeded
    Completed,
    /// A stage failed
    Failed,
}

impl EngineState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Executes one workflow run.
pub struct WorkflowEngine {
    registry: FunctionRegistry,
    work_dir: PathBuf,
    run_id: Uuid,
    state: EngineState,
    tasks: Vec<TaskRecord>,
    last_artifact: Option<PathBuf>,
}

impl WorkflowEngine {
    /// Create an idle engine writing artifacts into `work_dir`.
    pub fn new(registry: FunctionRegistry, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            work_dir: work_dir.into(),
            run_id: Uuid::new_v4(),
            state: EngineState::Idle,
            tasks: Vec::new(),
            last_artifact: None,
        }
    }

    /// Create an engine using the `[workflow]` config section.
    #[must_use]
    pub fn from_config(registry: FunctionRegistry, config: &WorkflowConfig) -> Self {
        Self::new(registry, config.resolved_work_dir())
    }

    /// Identifier of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Records of executed stages, in execution order.
    #[must_use]
    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    /// Artifact of the most recent stage that produced one.
    #[must_use]
    pub fn last_artifact(&self) -> Option<&Path> {
        self.last_artifact.as_deref()
    }

    /// Translate parsed calls and run them.
    ///
    /// Every call is translated before any stage runs, so an argument error
    /// leaves the engine idle.
    pub async fn run_calls(&mut self, calls: &[DslCall]) -> Result<()> {
        let plan = calls
            .iter()
            .map(|call| self.registry.translate(call))
            .collect::<Result<Vec<_>>>()?;
        self.run(&plan).await
    }

    /// Run `plan` stage by stage.
    ///
    /// # Errors
    /// Returns [`WorkflowError::InvalidState`] unless the engine is idle, and
    /// [`WorkflowError::Stage`] wrapping the first stage failure.
    pub async fn run(&mut self, plan: &[Invocation]) -> Result<()> {
        if self.state != EngineState::Idle {
            return Err(WorkflowError::InvalidState {
                action: "run",
                state: self.state.as_str(),
            });
        }
        self.state = EngineState::Running;
        info!(run_id = %self.run_id, stages = plan.len(), "starting workflow run");

        if let Err(e) = std::fs::create_dir_all(&self.work_dir) {
            self.state = EngineState::Failed;
            return Err(e.into());
        }

        for invocation in plan {
            if let Err(e) = self.run_stage(invocation).await {
                self.state = EngineState::Failed;
                warn!(run_id = %self.run_id, stage = %invocation.operation, "workflow run failed: {}", e);
                return Err(WorkflowError::Stage {
                    name: invocation.operation.clone(),
                    source: Box::new(e),
                });
            }
        }

        self.state = EngineState::Completed;
        info!(run_id = %self.run_id, stages = self.tasks.len(), "workflow run completed");
        Ok(())
    }

    async fn run_stage(&mut self, invocation: &Invocation) -> Result<()> {
        let operation = self.registry.operation(&invocation.operation)?;
        let params = serde_json::to_string(&invocation.params)?;
        debug!(stage = %invocation.operation, %params, "running stage");

        let started_at = Utc::now();
        let start = Instant::now();
        let ctx = StageContext {
            run_id: self.run_id,
            work_dir: &self.work_dir,
            input: self.last_artifact.as_deref(),
        };
        let output = operation.run(&ctx, &invocation.params).await?;
        let elapsed = start.elapsed();

        if let Some(path) = &output.artifact {
            debug!(stage = %invocation.operation, path = %path.display(), "stage wrote artifact");
            self.last_artifact = Some(path.clone());
        }
        self.tasks.push(TaskRecord {
            operation: invocation.operation.clone(),
            params,
            output: output.artifact,
            generated: output.generated,
            started_at,
            elapsed,
        });
        Ok(())
    }

    /// Delete every stage artifact of this run.
    ///
    /// Extra generated files belong to the caller and are left alone.
    /// Already-missing files are ignored; the first other failure is
    /// returned after all deletions were attempted.
    pub fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        for path in self.tasks.iter().filter_map(|task| task.output.as_ref()) {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed artifact"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), "failed to remove artifact: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        self.last_artifact = None;

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
