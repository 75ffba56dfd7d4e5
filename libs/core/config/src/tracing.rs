use crate::{LogConfig, LogFormat};
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in main() before any fallible operations to ensure
/// colored error output. Safe to call multiple times.
///
/// Configuration:
/// - Shows file:line where errors occur
/// - Hides environment variables (less noise)
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Build the filter for a given configuration; `RUST_LOG` wins when set.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()))
}

/// Initialize tracing from an explicit logging configuration.
///
/// - [`LogFormat::Json`]: one flattened JSON object per event, no module targets
///   (for log aggregation tools like ELK, Datadog, CloudWatch)
/// - [`LogFormat::Text`]: pretty-printed, human-readable output
///
/// Both variants include `tracing_error::ErrorLayer` so errors can capture the
/// span trace they happened in.
///
/// Safe to call multiple times: if a global subscriber is already installed
/// (common in tests) this silently continues.
pub fn init_tracing(config: &LogConfig) {
    let filter = env_filter(config);

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init(),
    };

    match result {
        Ok(_) => {
            info!(
                format = ?config.format,
                level = %config.level,
                "Tracing initialized with ErrorLayer"
            );
        }
        Err(_) => {
            debug!("Tracing already initialized, skipping re-initialization");
        }
    }
}
