//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "fetch_lot=info";

/// Install a default fmt subscriber filtered by `RUST_LOG`.
///
/// Does nothing when the application already installed a global subscriber, so
/// calling it from tests or libraries is harmless.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
