//! # Reconciler
//!
//! Core reconciliation logic for `Email` and `EmailSenderConfig` resources.
//!
//! The two reconcilers never call each other. They are coupled only through
//! the objects they read from the store:
//! - `email` sends each `Email` at most once and records the outcome in its status
//! - `sender_config` keeps a finalizer on each `EmailSenderConfig` so it
//!   outlives the emails that still need it

pub mod email;
pub mod journal;
pub mod sender_config;
pub mod status;
pub mod types;

// Re-export public API
pub use email::reconcile_email;
pub use journal::{JournalEntry, OutcomeJournal};
pub use sender_config::reconcile_sender_config;
pub use types::{backoff_key, BackoffState, Reconciler, ReconcilerError};
