use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global compact subscriber. `log_filter` comes from config,
/// which already folds in `OBSERVABILITY__LOG_FILTER` and `RUST_LOG`.
/// A second call is a no-op.
pub fn init_tracing(service_name: &str, log_filter: &str) {
    let _ = fmt()
        .with_target(false)
        .with_env_filter(env_filter(log_filter))
        .compact()
        .try_init();

    tracing::info!(service = service_name, filter = log_filter, "tracing initialized");
}

fn env_filter(log_filter: &str) -> EnvFilter {
    EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"))
}
