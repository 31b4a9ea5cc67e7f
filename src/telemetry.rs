//! Logging bootstrap for processes embedding the engine.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// Honors `RUST_LOG`; defaults to `crm_finance=info`. Calling it twice is a no-op.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crm_finance=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
