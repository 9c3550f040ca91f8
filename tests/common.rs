// tests/common.rs
//! Test log capture for the `logging` feature

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crate logs at debug plus `security` events; RUST_LOG replaces this
#[cfg(feature = "logging")]
const TEST_LOG_FILTER: &str = "submission_vault=debug,security=warn";

/// Capture crate and security-audit logs in the test output. Idempotent.
#[allow(dead_code)]
pub fn setup() {
    #[cfg(feature = "logging")]
    {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(TEST_LOG_FILTER));
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .without_time(),
            )
            .with(filter)
            .try_init();
    }
}
