//! Error types for search calls.

use crate::filter::FilterError;
use crate::Row;
use thiserror::Error;

/// Failure of a search call.
///
/// Server errors and cancellations carry the rows processed before the call
/// stopped.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The account cannot pay for the requested size
    #[error("insufficient privileges: {reason}")]
    QuotaExceeded {
        /// Why the quota gate refused
        reason: String,
    },

    /// The service reported an error
    #[error("server error: {message}")]
    Server {
        /// Message from the envelope or HTTP status
        message: String,
        /// Rows processed before the error
        partial: Vec<Row>,
    },

    /// The client's cancellation token fired
    #[error("search cancelled after {} rows", partial.len())]
    Cancelled {
        /// Rows processed before cancellation
        partial: Vec<Row>,
    },

    /// The filter expression did not compile
    #[error("filter compile error: {0}")]
    Compile(#[from] FilterError),

    /// A post-processing option needs a column the caller left out
    #[error("{field} field must be included when {option} is set")]
    MissingField {
        /// Required column
        field: &'static str,
        /// Option that requires it
        option: &'static str,
    },

    /// Dump batch size outside `1..=100000`
    #[error("batch size must be between 1 and 100000, got {0}")]
    BatchSize(usize),

    /// Transport failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body was not a valid envelope
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The dump consumer returned an error
    #[error("result consumer failed: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SearchError {
    /// Rows already processed when the call was aborted.
    ///
    /// Only server errors and cancellations keep partial rows; every other
    /// kind fails before or without yielding results.
    #[must_use]
    pub fn partial_rows(&self) -> &[Row] {
        match self {
            Self::Server { partial, .. } | Self::Cancelled { partial } => partial,
            _ => &[],
        }
    }

    /// Take ownership of the partial rows, leaving the error intact otherwise.
    pub fn take_partial(&mut self) -> Vec<Row> {
        match self {
            Self::Server { partial, .. } | Self::Cancelled { partial } => std::mem::take(partial),
            _ => Vec::new(),
        }
    }
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SearchError::MissingField {
            field: "host",
            option: "fix_url",
        };
        assert_eq!(
            err.to_string(),
            "host field must be included when fix_url is set"
        );

        let err = SearchError::Cancelled {
            partial: vec![vec!["1.1.1.1".to_string()]],
        };
        assert_eq!(err.to_string(), "search cancelled after 1 rows");
    }

    #[test]
    fn test_partial_rows() {
        let mut err = SearchError::Server {
            message: "[-4] Params Error".to_string(),
            partial: vec![vec!["a".to_string()], vec!["b".to_string()]],
        };
        assert_eq!(err.partial_rows().len(), 2);
        assert_eq!(err.take_partial().len(), 2);
        assert!(err.partial_rows().is_empty());

        let err = SearchError::BatchSize(0);
        assert!(err.partial_rows().is_empty());
    }
}
