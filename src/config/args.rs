//! # Command-line Arguments
//!
//! Process-level flags of the `email-operator` binary.

use std::net::SocketAddr;

use clap::Parser;

use crate::constants::{
    DEFAULT_HEALTH_PROBE_BIND_ADDRESS, DEFAULT_LEADER_ELECTION_ID, DEFAULT_METRICS_BIND_ADDRESS,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "email-operator")]
#[command(
    about = "Kubernetes operator that delivers Email resources through MailerSend",
    long_about = None,
    version
)]
pub struct Args {
    /// Address the Prometheus metrics endpoint binds to
    #[arg(long, value_name = "ADDR", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,

    /// Address the liveness and readiness probes bind to
    #[arg(long, value_name = "ADDR", default_value = DEFAULT_HEALTH_PROBE_BIND_ADDRESS)]
    pub health_probe_bind_address: SocketAddr,

    /// Run controllers only while holding the leader election Lease
    #[arg(long)]
    pub leader_elect: bool,

    /// Name of the leader election Lease
    #[arg(long, value_name = "NAME", default_value = DEFAULT_LEADER_ELECTION_ID)]
    pub leader_election_id: String,
}
