//! # Custom Resource Definitions
//!
//! CRD types for the email operator.
//!
//! ## Module Structure
//!
//! - `email.rs` - `Email` send request
//! - `sender_config.rs` - `EmailSenderConfig` sender credentials
//! - `status.rs` - `Email` status, phases and failure reasons

mod email;
mod sender_config;
mod status;

// Re-export all public types
pub use email::{Email, EmailSpec};
pub use sender_config::{EmailSenderConfig, EmailSenderConfigSpec};
pub use status::{EmailPhase, EmailStatus, FailureReason};
