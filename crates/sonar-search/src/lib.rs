//! Sonar Search - paginated asset search with row post-processing.
//!
//! This crate drives the remote search API and turns its free-form result
//! pages into aligned, deduplicated, filtered rows.
//!
//! # Pipeline
//!
//! 1. [`fields`] augments the requested columns with the transient columns
//!    each enabled option needs.
//! 2. [`client`] pages through the API (offset pages or continuation cursor),
//!    checking for cancellation before every fetch.
//! 3. [`processor`] applies IP dedup, wildcard dedup, the [`filter`] expression
//!    and the reachability [`probe`] to each row as it arrives.
//! 4. [`reducer`] keeps one row per link, preferring service rows.
//! 5. [`postprocess`] rebuilds URLs and trims the transient columns.
//!
//! # Example
//!
//! ```rust,ignore
//! use sonar_core::{AccountQuota, AppConfig, FetchSize, SearchOptions};
//! use sonar_search::{HttpSearchApi, SearchClient};
//! use std::sync::Arc;
//!
//! let config = AppConfig::load_with_env()?;
//! let api = Arc::new(HttpSearchApi::new(&config.api)?);
//! let client = SearchClient::new(api, AccountQuota::unknown());
//!
//! let results = client
//!     .host_search("port=80", FetchSize::Limit(10), &["ip", "port"], &SearchOptions::default())
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod client;
pub mod error;
pub mod fields;
pub mod filter;
pub mod postprocess;
pub mod probe;
pub mod processor;
pub mod quota;
pub mod reducer;

/// One matched asset: string cells aligned to the effective field list.
pub type Row = Vec<String>;

// Re-export commonly used types
pub use api::{
    HostResults, HostStatsData, HttpSearchApi, SearchAllRequest, SearchApi, SearchNextRequest,
};
pub use client::{PageHook, SearchClient, SearchResults, ACTIVE_FIELD};
pub use error::{Result, SearchError};
pub use fields::FieldPlan;
pub use filter::{FilterError, FilterExpr};
pub use probe::{HttpProber, ProbeOutcome, Prober};
