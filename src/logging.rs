use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default directives when neither RUST_LOG nor the config sets any
pub const DEFAULT_FILTER: &str = "warn,arcos=info";

/// Initialize tracing to stderr so command output on stdout stays clean.
///
/// RUST_LOG takes precedence over `filter`, which usually comes from the
/// config file. Calling this twice is harmless.
pub fn init(filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();

    tracing::debug!("Tracing initialized");
}
