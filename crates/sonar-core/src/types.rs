//! Shared types used across Sonar.
//!
//! The remote service encodes several tri-states as signed integers
//! (`-1` = all/unknown, `0` = none, `n` = a bound). They are modelled as
//! enums here so the distinct meanings cannot be collapsed by accident.

use crate::error::SonarError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Post-processing options for a single search call.
///
/// Each enabled option may make the field planner append transient columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Rewrite every `host` cell into a URL (`1.1.1.1:80` -> `http://1.1.1.1:80`)
    pub fix_url: bool,
    /// Scheme prefix used by `fix_url`; empty means derive it from `protocol`
    pub url_prefix: String,
    /// Search beyond the default one-year window
    pub full: bool,
    /// Keep only the first row seen for each `ip`
    pub uniq_by_ip: bool,
    /// Reachability probe depth; `0` disables probing
    pub is_active: u32,
    /// Enables wildcard/CNAME dedup when non-zero
    pub de_wildcard: u32,
    /// Boolean filter expression evaluated per row
    pub filter: Option<String>,
    /// Prefer `service` rows over `subdomain` rows sharing a link
    pub dedup_host: bool,
}

impl SearchOptions {
    /// The filter expression, if one is set and non-blank.
    #[must_use]
    pub fn filter_expr(&self) -> Option<&str> {
        self.filter.as_deref().filter(|f| !f.trim().is_empty())
    }
}

/// Requested result size of a counted search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum FetchSize {
    /// Fetch every matching row (`-1`)
    All,
    /// Only report the total match count (`0`)
    CountOnly,
    /// Fetch at most this many rows
    Limit(usize),
}

impl FetchSize {
    /// Decode the service's signed size convention.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => Self::CountOnly,
            n if n < 0 => Self::All,
            n => Self::Limit(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }

    /// Encode back into the signed convention.
    #[must_use]
    pub fn to_raw(self) -> i64 {
        match self {
            Self::All => -1,
            Self::CountOnly => 0,
            Self::Limit(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

impl From<i64> for FetchSize {
    fn from(raw: i64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<FetchSize> for i64 {
    fn from(size: FetchSize) -> Self {
        size.to_raw()
    }
}

/// Free rows per query granted by the caller's account tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum FreeAllotment {
    /// Tier could not be resolved (`-1`); no gating is applied
    Unknown,
    /// No free tier at all (`0`)
    None,
    /// This many rows are free per query
    Limited(usize),
}

impl FreeAllotment {
    /// Decode the service's signed allotment convention.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => Self::None,
            n if n < 0 => Self::Unknown,
            n => Self::Limited(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }
}

impl From<i64> for FreeAllotment {
    fn from(raw: i64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<FreeAllotment> for i64 {
    fn from(free: FreeAllotment) -> Self {
        match free {
            FreeAllotment::Unknown => -1,
            FreeAllotment::None => 0,
            FreeAllotment::Limited(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

/// How the service charges rows beyond the free allotment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeductMode {
    /// Never spend credit; oversized requests are clamped
    #[default]
    Free,
    /// Spend account credit automatically
    #[serde(alias = "fcoin")]
    Credit,
}

impl FromStr for DeductMode {
    type Err = SonarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "0" => Ok(Self::Free),
            "credit" | "fcoin" | "1" => Ok(Self::Credit),
            other => Err(SonarError::Validation(format!(
                "unknown deduct mode '{other}', expected free or credit"
            ))),
        }
    }
}

impl fmt::Display for DeductMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Credit => write!(f, "credit"),
        }
    }
}

/// Resolved account state consulted by the quota gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountQuota {
    /// Free rows per query
    pub free: FreeAllotment,
    /// Alternate credit balance
    pub credit: u64,
    /// Deduction policy
    pub mode: DeductMode,
}

impl AccountQuota {
    /// Quota for an account whose tier could not be resolved.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            free: FreeAllotment::Unknown,
            credit: 0,
            mode: DeductMode::Free,
        }
    }
}

impl Default for AccountQuota {
    fn default() -> Self {
        Self::unknown()
    }
}
