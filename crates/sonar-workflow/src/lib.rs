//! Sonar Workflow - multi-stage pipelines over search results.
//!
//! A pipeline is an ordered list of operation invocations. Each stage reads
//! the newline-delimited JSON artifact of the stage before it and may write a
//! new one; the [`WorkflowEngine`] chains them and keeps a [`TaskRecord`] per
//! stage for provenance.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use sonar_workflow::{ops, DslCall, FunctionRegistry, WorkflowEngine};
//!
//! let registry = FunctionRegistry::new();
//! ops::register_builtins(&registry, Some(search_client));
//!
//! let mut engine = WorkflowEngine::new(registry, std::env::temp_dir());
//! engine
//!     .run_calls(&[
//!         DslCall::new("fetch", vec![json!("port=80"), json!(100), json!("host,title")]),
//!         DslCall::new("grep_add", vec![json!("title"), json!("(?i)admin"), json!("admin")]),
//!     ])
//!     .await?;
//!
//! println!("{:?}", engine.last_artifact());
//! engine.close()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod artifact;
pub mod engine;
#[allow(missing_docs)]
pub mod error;
pub mod operation;
pub mod ops;
pub mod plan;
pub mod registry;
pub mod task;

// Re-export commonly used types
pub use engine::{EngineState, WorkflowEngine};
pub use error::{Result, WorkflowError};
pub use operation::{Operation, StageContext, StageOutput};
pub use plan::{DslCall, Invocation, TranslateRule};
pub use registry::FunctionRegistry;
pub use task::TaskRecord;
