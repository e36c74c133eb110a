//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging system with tracing.
///
/// Filtering is environment-based (`RUST_LOG`); without it the workspace
/// crates log at debug and everything else at info.
///
/// # Example
/// ```
/// cellgrid_core::init_logging();
/// tracing::info!("starting up");
/// ```
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cellgrid=debug,winit=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}
