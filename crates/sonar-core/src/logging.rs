//! Tracing subscriber setup shared by binaries and tests.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directives used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVES: &str = "info,sonar=debug";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_directives`. Returns `false` if a
/// subscriber was already installed, which makes repeated calls harmless.
pub fn init_tracing(default_directives: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(DEFAULT_DIRECTIVES);
        assert!(!init_tracing(DEFAULT_DIRECTIVES));
    }
}
