//! Core error types for Sonar.
//!
//! Subsystem crates define their own error enums; this one covers what is
//! shared: configuration and value validation.

use thiserror::Error;

/// Central error type for shared Sonar operations.
#[derive(Error, Debug)]
pub enum SonarError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `SonarError`.
pub type Result<T> = std::result::Result<T, SonarError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SonarError::Validation("unknown deduct mode".to_string());
        assert_eq!(err.to_string(), "validation error: unknown deduct mode");

        let err = ConfigError::InvalidValue {
            field: "search.page_size".to_string(),
            reason: "must be between 1 and 1000".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for search.page_size: must be between 1 and 1000"
        );
    }

    #[test]
    fn test_error_from_config() {
        let sonar_err: SonarError = ConfigError::NoConfigDir.into();
        assert!(matches!(sonar_err, SonarError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let sonar_err: SonarError = io_err.into();
        assert!(matches!(sonar_err, SonarError::Io(_)));
    }
}
