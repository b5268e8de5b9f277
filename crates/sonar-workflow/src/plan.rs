//! Parsed DSL calls and the invocations they translate into.

use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One function call as emitted by the pipeline parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DslCall {
    /// DSL function name, e.g. `grep_add`
    pub name: String,
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,
}

impl DslCall {
    /// Create a call from a name and positional arguments.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Positional argument `idx`, if present.
    #[must_use]
    pub fn arg(&self, idx: usize) -> Option<&Value> {
        self.args.get(idx)
    }

    /// Required string argument.
    pub fn str_arg(&self, idx: usize, what: &str) -> Result<String> {
        match self.arg(idx) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.invalid(format!("{what} must be a string, got {other}"))),
            None => Err(self.invalid(format!("missing {what}"))),
        }
    }

    pub(crate) fn invalid(&self, reason: String) -> WorkflowError {
        WorkflowError::InvalidArguments {
            name: self.name.clone(),
            reason,
        }
    }
}

/// A runtime operation call with named parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Registered operation name, e.g. `add_field`
    pub operation: String,
    /// Operation parameters
    pub params: Value,
}

impl Invocation {
    /// Create an invocation of `operation`.
    pub fn new(operation: impl Into<String>, params: Value) -> Self {
        Self {
            operation: operation.into(),
            params,
        }
    }
}

/// Rule turning a [`DslCall`] into an [`Invocation`].
pub type TranslateRule = Arc<dyn Fn(&DslCall) -> Result<Invocation> + Send + Sync>;
