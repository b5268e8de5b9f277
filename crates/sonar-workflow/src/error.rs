//! Error types for workflow runs.

use sonar_search::SearchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("stage {name} failed: {source}")]
    Stage {
        name: String,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("{0} is registered for parsing only and cannot run")]
    SyntaxOnly(String),

    #[error("invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("cannot {action} a workflow that is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("{0} needs the output of a previous stage")]
    MissingInput(String),

    #[error("invalid parameters: {0}")]
    Params(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl WorkflowError {
    /// Innermost error, unwrapping stage context.
    #[must_use]
    pub fn root_cause(&self) -> &WorkflowError {
        match self {
            Self::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;
