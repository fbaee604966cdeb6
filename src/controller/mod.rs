//! # Controller
//!
//! Reconcilers and the seams they depend on.
//!
//! - `reconciler` - `Email` and `EmailSenderConfig` reconciliation
//! - `store` - Kubernetes API access with optimistic concurrency
//! - `transport` - outbound MailerSend delivery
//! - `backoff` - Fibonacci retry delays
//! - `server` - metrics and probe endpoints

pub mod backoff;
pub mod reconciler;
pub mod server;
pub mod store;
pub mod transport;
