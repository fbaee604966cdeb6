//! # Configuration
//!
//! - `controller.rs` - operator settings from environment variables
//! - `args.rs` - command-line flags

mod args;
mod controller;

pub use args::Args;
pub use controller::ControllerConfig;
