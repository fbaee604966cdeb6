//! # Logging
//!
//! Tracing subscriber setup driven by `LOG_LEVEL`, `LOG_FORMAT` and
//! `LOG_ENABLE_COLOR`. `RUST_LOG` takes precedence when set.

use tracing_subscriber::EnvFilter;

use crate::config::ControllerConfig;

fn default_directive(config: &ControllerConfig) -> String {
    format!("email_operator={}", config.log_level.to_lowercase())
}

/// Install the global tracing subscriber
///
/// Returns without error if a subscriber is already installed (tests, or a
/// second call).
pub fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.log_enable_color)
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!("Tracing subscriber already initialized: {}", e);
    }
}
