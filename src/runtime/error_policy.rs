//! # Error Policy
//!
//! Maps reconciliation errors to requeue delays for both controllers.

use crate::controller::reconciler::{backoff_key, Reconciler, ReconcilerError};
use crate::controller::store::ObjectKey;
use crate::observability;
use kube::Resource;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing object never slows
/// down another. Optimistic-concurrency conflicts are retried at the minimum
/// delay without advancing the backoff: the object changed, and the next
/// reconcile works from its new state.
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let controller = K::kind(&()).to_lowercase();
    let key = ObjectKey::from_resource(obj.as_ref());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        controller = %controller,
        resource.name = %key.name,
        resource.namespace = %key.namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    observability::metrics::increment_reconciliation_errors(&controller, error.metric_label());

    if error.is_conflict() {
        let delay = ctx.config.min_retry_delay();
        info!(
            "Conflict for {}, retrying in {}s: {}",
            key,
            delay.as_secs(),
            error
        );
        observability::metrics::increment_requeues("conflict");
        return Action::requeue(delay);
    }

    let (delay, error_count) = ctx.next_backoff(&backoff_key(&controller, &key));

    match error {
        ReconcilerError::TransientTransport { .. } => {
            warn!("Reconciliation error for {}: {}", key, error);
        }
        _ => {
            error!("Reconciliation error for {}: {:?}", key, error);
        }
    }

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}, next retry: {})",
        delay.as_secs(),
        error_count,
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues("error-backoff");
    Action::requeue(delay)
}
