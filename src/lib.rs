pub mod commands;
pub mod models;
pub mod services;

pub use models::config::{AppConfig, LoggingConfig};
pub use models::verification::{Verification, VerificationStatus};
pub use services::config::{ConfigError, ConfigManager};
pub use services::session::{Platform, SessionCodec, VerificationSession};
pub use services::verifier::Verifier;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Output goes to stderr so
/// command results on stdout stay machine-readable. Calling this twice is a no-op.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(json = config.json, filter = %config.filter, "tracing initialized");
    }
}
