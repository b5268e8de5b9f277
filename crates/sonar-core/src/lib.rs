//! Sonar Core - Foundation crate for the Sonar asset-search toolkit.
//!
//! This crate provides the shared types, error handling, configuration
//! management and logging setup that the search and workflow crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Search options and the quota/size tri-states
//! - [`logging`] - `tracing-subscriber` initialisation
//!
//! # Example
//!
//! ```rust
//! use sonar_core::{AppConfig, FetchSize, SearchOptions};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.search.page_size, 1000);
//!
//! let options = SearchOptions {
//!     fix_url: true,
//!     ..SearchOptions::default()
//! };
//! assert!(options.fix_url);
//! assert_eq!(FetchSize::from_raw(-1), FetchSize::All);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::{
    ApiConfig, AppConfig, ProbeConfig, SearchConfig, WorkflowConfig, MAX_PAGE_SIZE,
};
pub use error::{ConfigError, ConfigResult, Result, SonarError};
pub use types::{AccountQuota, DeductMode, FetchSize, FreeAllotment, SearchOptions};
