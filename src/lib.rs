//! Email Operator Library
//!
//! Kubernetes operator that turns `Email` custom resources into messages
//! delivered through the MailerSend API, using credentials from
//! `EmailSenderConfig` resources in the same namespace.
//!
//! ## Quick Start
//!
//! ```rust
//! use email_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
