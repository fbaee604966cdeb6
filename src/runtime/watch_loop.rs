//! # Watch Loop
//!
//! Runs the `Email` and `EmailSenderConfig` controllers side by side until a
//! shutdown signal arrives or, with leader election enabled, leadership is
//! lost.

use crate::config::Args;
use crate::controller::reconciler::{reconcile_email, reconcile_sender_config, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{Email, EmailSenderConfig};
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::runtime::initialization::InitializationResult;
use crate::runtime::leader_election::LeaderElector;
use futures::StreamExt;
use kube::api::Api;
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Run both controllers, honouring `--leader-elect`
///
/// # Errors
///
/// Returns an error when leadership is lost while the controllers are
/// running, so the process exits and its replacement campaigns again.
pub async fn run(args: &Args, init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        client,
        reconciler,
        server_state,
    } = init;

    spawn_shutdown_handler(server_state.clone());

    if !args.leader_elect {
        run_controllers(client, reconciler, server_state).await;
        info!("Controllers stopped gracefully");
        return Ok(());
    }

    let identity = reconciler
        .config
        .pod_name
        .clone()
        .unwrap_or_else(|| format!("email-operator-{}", uuid::Uuid::new_v4()));
    let elector = Arc::new(LeaderElector::new(
        client.clone(),
        &args.leader_election_id,
        &reconciler.config.operator_namespace,
        &identity,
    ));

    let mut guard = tokio::select! {
        guard = elector.acquire() => guard,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested before leadership was acquired");
            return Ok(());
        }
    };

    let leadership_lost = tokio::select! {
        () = run_controllers(client, reconciler, server_state.clone()) => false,
        () = guard.lost() => true,
    };

    if leadership_lost {
        server_state.set_ready(false);
        error!(identity = %identity, "Leadership lost, exiting");
        return Err(anyhow::anyhow!("leadership lost"));
    }

    info!("Controllers stopped gracefully");
    if let Err(e) = guard.release_leadership().await {
        warn!("Failed to release leadership: {}", e);
    }
    Ok(())
}

/// Mark the operator not ready as soon as SIGINT/SIGTERM arrives
fn spawn_shutdown_handler(server_state: Arc<ServerState>) {
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });
}

/// Run both controllers until they shut down on signal
async fn run_controllers(client: Client, reconciler: Arc<Reconciler>, server_state: Arc<ServerState>) {
    let concurrency = reconciler.config.max_concurrent_reconciliations;
    let emails: Api<Email> = Api::all(client.clone());
    let sender_configs: Api<EmailSenderConfig> = Api::all(client);

    let email_controller = Controller::new(emails, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile_email, handle_reconciliation_error, reconciler.clone())
        .for_each(|result| {
            log_reconcile_result("email", result.map(|(obj, _)| obj.to_string()));
            futures::future::ready(())
        });

    let sender_config_controller = Controller::new(sender_configs, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(
            reconcile_sender_config,
            handle_reconciliation_error,
            reconciler,
        )
        .for_each(|result| {
            log_reconcile_result(
                "emailsenderconfig",
                result.map(|(obj, _)| obj.to_string()),
            );
            futures::future::ready(())
        });

    server_state.set_ready(true);
    info!(concurrency, "Controllers started");

    tokio::join!(email_controller, sender_config_controller);
    server_state.set_ready(false);
}

fn log_reconcile_result<E: std::fmt::Display>(controller: &str, result: Result<String, E>) {
    match result {
        Ok(object) => debug!(controller, object = %object, "watch.event.success"),
        Err(e) => debug!(controller, "watch.event.error: {}", e),
    }
}
