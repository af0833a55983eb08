use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Structured JSON logging to stdout; `RUST_LOG` controls the level
pub fn init_telemetry() {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(formatting_layer)
        .init();
}

/// Like `init_telemetry`, but tolerates a subscriber already being set
///
/// Integration tests spawn many servers in one process.
pub fn try_init_test_telemetry() {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_test_writer()
        .json();

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(formatting_layer)
        .try_init();
}
