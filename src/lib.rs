pub mod config;
pub mod models;
pub mod pipeline;
pub mod scoring;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins; otherwise [`config::default_log_filter`] applies. Logs go
/// to stderr so stdout stays clean JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
