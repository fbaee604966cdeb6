//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of both custom resources
pub const API_GROUP: &str = "email.example.com";

/// Finalizer placed on `EmailSenderConfig` resources
pub const SENDER_CONFIG_FINALIZER: &str = "email.example.com/finalizer";

/// Field manager used for every write the operator makes
pub const FIELD_MANAGER: &str = "email-operator";

/// Controller label for `Email` reconciliation (metrics, logs, backoff keys)
pub const EMAIL_CONTROLLER: &str = "email";

/// Controller label for `EmailSenderConfig` reconciliation
pub const SENDER_CONFIG_CONTROLLER: &str = "emailsenderconfig";

/// Default MailerSend API base URL
pub const DEFAULT_MAILERSEND_API_URL: &str = "https://api.mailersend.com";

/// Path of the MailerSend send endpoint, relative to the base URL
pub const MAILERSEND_SEND_PATH: &str = "/v1/email";

/// Default timeout for a single outbound send (seconds)
pub const DEFAULT_TRANSPORT_TIMEOUT_SECS: u64 = 30;

/// Default number of send attempts before a retryable failure becomes terminal
pub const DEFAULT_MAX_SEND_ATTEMPTS: u32 = 5;

/// Default requeue after adding a finalizer (seconds)
pub const DEFAULT_FINALIZER_REQUEUE_SECS: u64 = 1;

/// Default requeue while a deleted sender config is still referenced by in-flight emails (seconds)
pub const DEFAULT_SENDER_CONFIG_DELETION_REQUEUE_SECS: u64 = 30;

/// Default Fibonacci backoff starting value for reconciliation errors (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff cap for reconciliation errors (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default upper bound on concurrent reconciliations per controller
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default bind address for the Prometheus metrics endpoint
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default bind address for the liveness and readiness probes
pub const DEFAULT_HEALTH_PROBE_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default name of the leader election Lease
pub const DEFAULT_LEADER_ELECTION_ID: &str = "email-operator-leader-election";

/// Namespace used when the operator cannot discover its own
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "email-operator-system";

/// How long a leader election Lease stays valid without renewal (seconds)
pub const LEASE_DURATION_SECS: u64 = 15;

/// How often the leader renews its Lease (seconds)
pub const LEASE_RENEW_INTERVAL_SECS: u64 = 5;

/// How often a standby retries to acquire the Lease (seconds)
pub const LEASE_RETRY_INTERVAL_SECS: u64 = 2;
