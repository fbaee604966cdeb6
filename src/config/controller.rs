//! # Controller Configuration
//!
//! Operator-level settings loaded from environment variables.

use std::time::Duration;

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_FINALIZER_REQUEUE_SECS,
    DEFAULT_MAILERSEND_API_URL, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_MAX_SEND_ATTEMPTS,
    DEFAULT_OPERATOR_NAMESPACE, DEFAULT_SENDER_CONFIG_DELETION_REQUEUE_SECS,
    DEFAULT_TRANSPORT_TIMEOUT_SECS,
};

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Base URL of the MailerSend API (`/v1/email` is appended)
    pub mailersend_api_url: String,
    /// Timeout for a single outbound send (seconds)
    pub transport_timeout_secs: u64,
    /// Send attempts allowed before a retryable failure is recorded as terminal
    pub max_send_attempts: u32,
    /// Re-send an `Email` in a terminal phase when its spec generation advances
    pub resend_on_spec_change: bool,
    /// Requeue delay after a finalizer was added (seconds)
    pub finalizer_requeue_secs: u64,
    /// Requeue delay while a deleted sender config is still needed (seconds)
    pub sender_config_deletion_requeue_secs: u64,
    /// First value of the per-resource Fibonacci error backoff (seconds)
    pub backoff_min_secs: u64,
    /// Cap of the per-resource Fibonacci error backoff (seconds)
    pub backoff_max_secs: u64,
    /// Maximum concurrent reconciliations per controller
    pub max_concurrent_reconciliations: u16,
    /// Namespace the operator runs in (leader election Lease lives here)
    pub operator_namespace: String,
    /// Identity used when holding the leader election Lease
    pub pod_name: Option<String>,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mailersend_api_url: DEFAULT_MAILERSEND_API_URL.to_string(),
            transport_timeout_secs: DEFAULT_TRANSPORT_TIMEOUT_SECS,
            max_send_attempts: DEFAULT_MAX_SEND_ATTEMPTS,
            resend_on_spec_change: false,
            finalizer_requeue_secs: DEFAULT_FINALIZER_REQUEUE_SECS,
            sender_config_deletion_requeue_secs: DEFAULT_SENDER_CONFIG_DELETION_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            pod_name: None,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            log_enable_color: false,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let max_send_attempts: u32 =
            parse_or_default(lookup("MAX_SEND_ATTEMPTS"), defaults.max_send_attempts);
        let backoff_min_secs: u64 =
            parse_or_default(lookup("BACKOFF_MIN_SECS"), defaults.backoff_min_secs);
        let backoff_max_secs: u64 =
            parse_or_default(lookup("BACKOFF_MAX_SECS"), defaults.backoff_max_secs);

        Self {
            mailersend_api_url: lookup("MAILERSEND_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.mailersend_api_url),
            transport_timeout_secs: parse_or_default(
                lookup("TRANSPORT_TIMEOUT_SECS"),
                defaults.transport_timeout_secs,
            )
            .max(1),
            // Zero attempts would mean never sending at all
            max_send_attempts: max_send_attempts.max(1),
            resend_on_spec_change: bool_or_default(
                lookup("RESEND_ON_SPEC_CHANGE"),
                defaults.resend_on_spec_change,
            ),
            finalizer_requeue_secs: parse_or_default(
                lookup("FINALIZER_REQUEUE_SECS"),
                defaults.finalizer_requeue_secs,
            ),
            sender_config_deletion_requeue_secs: parse_or_default(
                lookup("SENDER_CONFIG_DELETION_REQUEUE_SECS"),
                defaults.sender_config_deletion_requeue_secs,
            ),
            backoff_min_secs: backoff_min_secs.max(1),
            backoff_max_secs: backoff_max_secs.max(backoff_min_secs.max(1)),
            max_concurrent_reconciliations: parse_or_default(
                lookup("MAX_CONCURRENT_RECONCILIATIONS"),
                defaults.max_concurrent_reconciliations,
            ),
            operator_namespace: lookup("POD_NAMESPACE").unwrap_or(defaults.operator_namespace),
            pod_name: lookup("POD_NAME").filter(|name| !name.is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT").unwrap_or(defaults.log_format),
            log_enable_color: bool_or_default(
                lookup("LOG_ENABLE_COLOR"),
                defaults.log_enable_color,
            ),
        }
    }

    /// Get transport timeout duration
    #[must_use]
    pub fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.transport_timeout_secs)
    }

    /// Get requeue delay after adding a finalizer
    #[must_use]
    pub fn finalizer_requeue(&self) -> Duration {
        Duration::from_secs(self.finalizer_requeue_secs)
    }

    /// Get requeue delay while a deleted sender config is still referenced
    #[must_use]
    pub fn sender_config_deletion_requeue(&self) -> Duration {
        Duration::from_secs(self.sender_config_deletion_requeue_secs)
    }

    /// Shortest retry delay; also used for conflicts and in-flight waits
    #[must_use]
    pub fn min_retry_delay(&self) -> Duration {
        Duration::from_secs(self.backoff_min_secs)
    }
}

fn parse_or_default<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn bool_or_default(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| {
            let v_lower = v.trim().to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}
