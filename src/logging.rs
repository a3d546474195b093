//! Console logging setup.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize console logging for an embedding process.
///
/// # Configuration
///
/// - **Log level**: controlled by `LOG_LEVEL` environment variable
///   (default: "info"); `RUST_LOG` takes precedence when set
/// - **Filtering**: noisy dependencies filtered to warn level
/// - **Format**: compact, with targets and source locations
pub fn init_console_logging() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={},sqlx=warn",
            env!("CARGO_PKG_NAME"),
            log_level
        ))
    });

    let console_layer = fmt::layer()
        .compact()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(console_layer).init();
}
