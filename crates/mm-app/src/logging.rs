use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Compact stdout logging. Default level INFO with debug for our crates,
/// override via RUST_LOG.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,meshmind=debug,mm_gen=debug,mm_mesh=debug"));

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();

    tracing::debug!("Tracing initialized");
}
