//! # Initialization
//!
//! Operator startup: rustls setup, tracing, metrics, HTTP servers for metrics
//! and probes, the Kubernetes client and the MailerSend transport.

use crate::config::{Args, ControllerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{metrics_router, probe_router, serve, ServerState};
use crate::controller::store::KubeStore;
use crate::controller::transport::MailerSendTransport;
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Everything the watch loop needs to run
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Shared reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for readiness
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Initialize the operator runtime
///
/// Readiness stays false until the watch loop starts the controllers.
///
/// # Errors
///
/// Fails when a listener cannot be bound, the Kubernetes client cannot be
/// created, or the MailerSend HTTP client cannot be built.
pub async fn initialize(args: &Args) -> Result<InitializationResult> {
    // Must run before any rustls client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let config = ControllerConfig::from_env();
    observability::logging::init_tracing(&config);

    info!("Starting Email Operator");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        api_url = %config.mailersend_api_url,
        timeout_secs = config.transport_timeout_secs,
        max_send_attempts = config.max_send_attempts,
        resend_on_spec_change = config.resend_on_spec_change,
        "Loaded operator configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    start_server("metrics", args.metrics_bind_address, metrics_router()).await?;
    start_server(
        "health probe",
        args.health_probe_bind_address,
        probe_router(server_state.clone()),
    )
    .await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let transport = MailerSendTransport::new(&config.mailersend_api_url, config.transport_timeout())
        .context("Failed to build MailerSend HTTP client")?;
    info!(endpoint = %transport.endpoint(), "MailerSend transport ready");

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(transport),
        config,
    ));

    info!("Operator initialized, starting controllers...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}

/// Bind `address` and serve `router` in a background task
async fn start_server(name: &'static str, address: SocketAddr, router: axum::Router) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {name} server to {address}"))?;
    info!("Serving {} on {}", name, address);

    tokio::spawn(async move {
        if let Err(e) = serve(listener, router).await {
            error!("{} server error: {}", name, e);
        }
    });

    Ok(())
}
