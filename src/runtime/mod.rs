//! # Runtime
//!
//! Process wiring around the reconcilers:
//!
//! - `initialization.rs` - tracing, metrics, HTTP servers and clients
//! - `watch_loop.rs` - the two controllers, leader election and shutdown
//! - `error_policy.rs` - requeue delays for failed reconciliations
//! - `leader_election.rs` - Lease-based single active replica

pub mod error_policy;
pub mod initialization;
pub mod leader_election;
pub mod watch_loop;
