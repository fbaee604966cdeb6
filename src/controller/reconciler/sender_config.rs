//! # EmailSenderConfig Reconciliation
//!
//! Keeps the finalizer on every `EmailSenderConfig` and removes it once the
//! object is being deleted and no `Email` still needs it.
//!
//! | deleting | finalizer | action                                              |
//! |----------|-----------|-----------------------------------------------------|
//! | no       | no        | add finalizer, requeue shortly                      |
//! | no       | yes       | steady state                                        |
//! | yes      | yes       | remove finalizer unless referencing emails are in flight |
//! | yes      | no        | nothing left to do                                  |

use std::sync::Arc;
use std::time::Instant;

use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::{debug, info, info_span, Instrument};

use crate::constants::{SENDER_CONFIG_CONTROLLER, SENDER_CONFIG_FINALIZER};
use crate::controller::reconciler::types::{backoff_key, Reconciler, ReconcilerError};
use crate::controller::store::{ObjectKey, StoreError};
use crate::crd::{Email, EmailPhase, EmailSenderConfig};
use crate::observability::metrics;

/// Reconcile a single `EmailSenderConfig`
///
/// # Errors
///
/// Returns a retryable error when the store cannot be read, or when a
/// finalizer update fails (including optimistic-concurrency conflicts).
pub async fn reconcile_sender_config(
    config: Arc<EmailSenderConfig>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let Some(namespace) = config.namespace() else {
        return Err(ReconcilerError::InvalidObject(format!(
            "EmailSenderConfig {} has no namespace",
            config.name_any()
        )));
    };
    let key = ObjectKey::new(namespace, config.name_any());

    let span = info_span!(
        "reconcile",
        controller = SENDER_CONFIG_CONTROLLER,
        resource.namespace = %key.namespace,
        resource.name = %key.name,
    );

    let start = Instant::now();
    metrics::increment_reconciliations(SENDER_CONFIG_CONTROLLER);

    let result = reconcile_sender_config_inner(&key, &ctx)
        .instrument(span)
        .await;

    metrics::observe_reconciliation_duration(
        SENDER_CONFIG_CONTROLLER,
        start.elapsed().as_secs_f64(),
    );
    if result.is_ok() {
        ctx.reset_backoff(&backoff_key(SENDER_CONFIG_CONTROLLER, &key));
    }
    result
}

async fn reconcile_sender_config_inner(
    key: &ObjectKey,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let Some(config) = ctx
        .store
        .get_sender_config(&key.namespace, &key.name)
        .await?
    else {
        debug!("EmailSenderConfig no longer exists");
        return Ok(Action::await_change());
    };

    match (config.is_being_deleted(), config.has_finalizer()) {
        (false, false) => {
            let mut finalizers = config.finalizers();
            finalizers.push(SENDER_CONFIG_FINALIZER.to_string());
            ctx.store
                .update_sender_config_finalizers(&config, &finalizers)
                .await?;
            metrics::increment_finalizer_operations("add");
            info!(finalizer = SENDER_CONFIG_FINALIZER, "Added finalizer");
            metrics::increment_requeues("finalizer-added");
            Ok(Action::requeue(ctx.config.finalizer_requeue()))
        }
        (false, true) => Ok(Action::await_change()),
        (true, true) => finalize(key, &config, ctx).await,
        (true, false) => {
            debug!("EmailSenderConfig is being deleted and carries no finalizer");
            Ok(Action::await_change())
        }
    }
}

async fn finalize(
    key: &ObjectKey,
    config: &EmailSenderConfig,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let emails = ctx.store.list_emails(&key.namespace).await?;
    let in_flight: Vec<String> = emails
        .iter()
        .filter(|email| is_in_flight_reference(email, &key.name))
        .map(ResourceExt::name_any)
        .collect();

    if !in_flight.is_empty() {
        info!(
            emails = ?in_flight,
            requeue_secs = ctx.config.sender_config_deletion_requeue_secs,
            "Deletion held while referencing emails are in flight"
        );
        metrics::increment_requeues("deletion-held");
        return Ok(Action::requeue(ctx.config.sender_config_deletion_requeue()));
    }

    let finalizers: Vec<String> = config
        .finalizers()
        .into_iter()
        .filter(|finalizer| finalizer != SENDER_CONFIG_FINALIZER)
        .collect();

    match ctx
        .store
        .update_sender_config_finalizers(config, &finalizers)
        .await
    {
        Ok(_) => {
            metrics::increment_finalizer_operations("remove");
            info!(finalizer = SENDER_CONFIG_FINALIZER, "Removed finalizer");
        }
        Err(StoreError::NotFound { .. }) => {
            debug!("EmailSenderConfig already removed");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(Action::await_change())
}

/// Unsent `Email` in the same namespace pointing at `sender_name`
fn is_in_flight_reference(email: &Email, sender_name: &str) -> bool {
    email.spec.sender_config_name == sender_name
        && !email.is_being_deleted()
        && !email.phase().is_some_and(EmailPhase::is_terminal)
}
