//! # Email Reconciliation
//!
//! Drives an `Email` from creation to a terminal `Sent` or `Failed` phase.
//!
//! ## Reconciliation Flow
//!
//! 1. Fresh read of the `Email` (not the watch cache)
//! 2. Terminal phase: nothing to do unless re-send on spec change applies
//! 3. `Sending` phase: recover the interrupted attempt without sending
//! 4. `Pending` after a failed attempt: wait out the backoff measured from
//!    `lastAttemptTime`; status writes trigger reconciles of their own
//! 5. Resolve the referenced `EmailSenderConfig`
//! 6. Write the `Sending` marker, conditioned on the resourceVersion just read
//! 7. Send through the transport with a timeout
//! 8. Persist the outcome; on failure keep it in the outcome journal
//!
//! Only the invocation whose `Sending` write wins the compare-and-swap
//! reaches the transport, so duplicate concurrent reconciles send at most
//! once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::constants::EMAIL_CONTROLLER;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::journal::JournalEntry;
use crate::controller::reconciler::status;
use crate::controller::reconciler::types::{backoff_key, Reconciler, ReconcilerError};
use crate::controller::store::ObjectKey;
use crate::controller::transport::{OutboundEmail, TransportError};
use crate::crd::{Email, EmailPhase, EmailStatus, FailureReason};
use crate::observability::metrics;

/// Reconcile a single `Email`
///
/// # Errors
///
/// Returns a retryable error when the store cannot be read or written, when
/// another invocation won the `Sending` compare-and-swap, or after a
/// retryable transport failure.
pub async fn reconcile_email(
    email: Arc<Email>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let Some(namespace) = email.namespace() else {
        return Err(ReconcilerError::InvalidObject(format!(
            "Email {} has no namespace",
            email.name_any()
        )));
    };
    let key = ObjectKey::new(namespace, email.name_any());

    let span = info_span!(
        "reconcile",
        controller = EMAIL_CONTROLLER,
        resource.namespace = %key.namespace,
        resource.name = %key.name,
    );

    let start = Instant::now();
    metrics::increment_reconciliations(EMAIL_CONTROLLER);

    let result = reconcile_email_inner(&key, &ctx).instrument(span).await;

    metrics::observe_reconciliation_duration(EMAIL_CONTROLLER, start.elapsed().as_secs_f64());
    if result.is_ok() {
        ctx.reset_backoff(&backoff_key(EMAIL_CONTROLLER, &key));
    }
    result
}

async fn reconcile_email_inner(
    key: &ObjectKey,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let Some(email) = ctx.store.get_email(&key.namespace, &key.name).await? else {
        debug!("Email no longer exists");
        ctx.outcomes.forget_all(key);
        return Ok(Action::await_change());
    };

    if email.is_being_deleted() {
        debug!("Email is being deleted, skipping");
        return Ok(Action::await_change());
    }

    let current = email.status.clone().unwrap_or_default();
    let generation = email.metadata.generation;

    let base = match current.phase {
        Some(phase) if phase.is_terminal() => {
            if !should_resend(ctx, &current, generation) {
                debug!(phase = %phase, "Email already {}, nothing to do", phase);
                return Ok(Action::await_change());
            }
            info!(
                phase = %phase,
                generation = ?generation,
                observed_generation = ?current.observed_generation,
                "Spec changed since the last outcome, sending again"
            );
            EmailStatus::default()
        }
        Some(EmailPhase::Sending) => return recover_in_flight(key, &email, &current, ctx).await,
        _ => current,
    };

    if let Some(remaining) = retry_backoff_remaining(ctx, &base, Utc::now()) {
        debug!(
            attempts = base.attempts,
            remaining_secs = remaining.as_secs(),
            "Previous attempt failed, waiting out the backoff"
        );
        metrics::increment_requeues("retry-backoff");
        return Ok(Action::requeue(remaining));
    }

    let sender_name = &email.spec.sender_config_name;
    let sender = match ctx.store.get_sender_config(&key.namespace, sender_name).await {
        Ok(Some(sender)) => sender,
        Ok(None) => {
            let error = format!("EmailSenderConfig {}/{sender_name} not found", key.namespace);
            return fail_without_send(&email, &base, FailureReason::SenderConfigUnavailable, error, ctx)
                .await;
        }
        Err(err) => {
            let error = format!(
                "failed to read EmailSenderConfig {}/{sender_name}: {err}",
                key.namespace
            );
            return fail_without_send(&email, &base, FailureReason::SenderConfigUnavailable, error, ctx)
                .await;
        }
    };

    // Registered before the marker is visible, so a concurrent reader of the
    // Sending phase never mistakes this attempt for an interrupted one
    let attempt_id = Uuid::new_v4().to_string();
    let marker = status::sending(&base, generation, &attempt_id);
    ctx.outcomes.begin(key, &attempt_id);

    let email = match ctx.store.update_email_status(&email, &marker).await {
        Ok(updated) => updated,
        Err(err) => {
            ctx.outcomes.forget(key, &attempt_id);
            if err.is_conflict() {
                debug!(attempt_id = %attempt_id, "Lost the Sending race, not sending");
            }
            return Err(err.into());
        }
    };

    info!(
        attempt_id = %attempt_id,
        attempt = marker.attempts,
        to = %email.spec.to,
        sender = %sender_name,
        "Sending email"
    );

    let outbound = OutboundEmail::new(&email, &sender);
    let timeout = ctx.config.transport_timeout();
    let outcome = match tokio::time::timeout(timeout, ctx.transport.send(&outbound)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(TransportError::Timeout(timeout)),
    };

    let (next, result) = match outcome {
        Ok(receipt) => (
            status::sent(&marker, receipt.message_id),
            Ok(Action::await_change()),
        ),
        Err(err) if err.is_retryable() && marker.attempts < ctx.config.max_send_attempts => {
            let next = status::retrying(&marker, err.to_string());
            let result = Err(ReconcilerError::TransientTransport {
                key: key.clone(),
                attempt: marker.attempts,
                source: err,
            });
            (next, result)
        }
        Err(err) if err.is_retryable() => (
            status::failed(
                &marker,
                generation,
                FailureReason::AttemptsExhausted,
                format!("giving up after {} attempts: {err}", marker.attempts),
            ),
            Ok(Action::await_change()),
        ),
        Err(err @ TransportError::MalformedResponse(_)) => (
            status::failed(&marker, generation, FailureReason::MalformedResponse, err.to_string()),
            Ok(Action::await_change()),
        ),
        Err(err) => (
            status::failed(&marker, generation, FailureReason::Rejected, err.to_string()),
            Ok(Action::await_change()),
        ),
    };

    persist_outcome(key, &email, &attempt_id, next, ctx).await?;
    result
}

fn should_resend(ctx: &Reconciler, current: &EmailStatus, generation: Option<i64>) -> bool {
    ctx.config.resend_on_spec_change
        && generation.is_some_and(|generation| {
            current
                .observed_generation
                .is_none_or(|observed| generation > observed)
        })
}

/// Time left before a `Pending` email may be attempted again
///
/// `None` when no attempt failed yet, the backoff has elapsed, or
/// `lastAttemptTime` is missing or unreadable.
fn retry_backoff_remaining(
    ctx: &Reconciler,
    status: &EmailStatus,
    now: DateTime<Utc>,
) -> Option<Duration> {
    if status.phase != Some(EmailPhase::Pending) || status.attempts == 0 {
        return None;
    }
    let last_attempt = status
        .last_attempt_time
        .as_deref()
        .and_then(|time| DateTime::parse_from_rfc3339(time).ok())?
        .with_timezone(&Utc);
    let delay = FibonacciBackoff::delay_after_attempts(
        ctx.config.backoff_min_secs,
        ctx.config.backoff_max_secs,
        status.attempts,
    );
    let due = last_attempt + chrono::Duration::from_std(delay).ok()?;
    (due - now).to_std().ok().filter(|remaining| !remaining.is_zero())
}

/// Terminal failure recorded before any attempt was made
async fn fail_without_send(
    email: &Email,
    base: &EmailStatus,
    reason: FailureReason,
    error: String,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    warn!(reason = %reason, error = %error, "Email cannot be sent");
    let next = status::failed(base, email.metadata.generation, reason, error);
    ctx.store.update_email_status(email, &next).await?;
    metrics::increment_emails_failed(reason.as_str());
    Ok(Action::await_change())
}

/// Persist the status produced by an attempt
///
/// A failed write leaves the status in the journal so the next reconcile can
/// record it without sending again.
async fn persist_outcome(
    key: &ObjectKey,
    email: &Email,
    attempt_id: &str,
    next: EmailStatus,
    ctx: &Reconciler,
) -> Result<(), ReconcilerError> {
    match ctx.store.update_email_status(email, &next).await {
        Ok(_) => {
            ctx.outcomes.forget(key, attempt_id);
            record_outcome(attempt_id, &next);
            Ok(())
        }
        Err(err) => {
            warn!(
                attempt_id = %attempt_id,
                phase = ?next.phase,
                error = %err,
                "Failed to record send outcome, keeping it for the next reconcile"
            );
            ctx.outcomes.complete(key, attempt_id, next);
            Err(ReconcilerError::OutcomeNotPersisted {
                key: key.clone(),
                attempt_id: attempt_id.to_string(),
                source: err,
            })
        }
    }
}

fn record_outcome(attempt_id: &str, status: &EmailStatus) {
    match status.phase {
        Some(EmailPhase::Sent) => {
            metrics::increment_emails_sent();
            info!(
                attempt_id = %attempt_id,
                message_id = ?status.message_id,
                "Email sent successfully"
            );
        }
        Some(EmailPhase::Failed) => {
            let reason = status.reason.map_or("Unknown", FailureReason::as_str);
            metrics::increment_emails_failed(reason);
            warn!(
                attempt_id = %attempt_id,
                reason = reason,
                error = ?status.error,
                "Email failed"
            );
        }
        _ => {
            debug!(
                attempt_id = %attempt_id,
                attempts = status.attempts,
                error = ?status.error,
                "Send attempt failed, will retry"
            );
        }
    }
}

/// Resolve an `Email` left in the `Sending` phase
async fn recover_in_flight(
    key: &ObjectKey,
    email: &Email,
    current: &EmailStatus,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let attempt_id = current.attempt_id.clone().unwrap_or_default();

    match ctx.outcomes.lookup(key, &attempt_id) {
        Some(JournalEntry::InFlight) => {
            debug!(attempt_id = %attempt_id, "Send attempt still in flight, checking back later");
            metrics::increment_requeues("in-flight");
            Ok(Action::requeue(ctx.config.min_retry_delay()))
        }
        Some(JournalEntry::Completed(outcome)) => {
            info!(
                attempt_id = %attempt_id,
                phase = ?outcome.phase,
                "Recording previously unsaved send outcome"
            );
            let retry = outcome.phase == Some(EmailPhase::Pending);
            persist_outcome(key, email, &attempt_id, outcome, ctx).await?;
            if retry {
                metrics::increment_requeues("retry");
                Ok(Action::requeue(ctx.config.min_retry_delay()))
            } else {
                Ok(Action::await_change())
            }
        }
        None => {
            warn!(
                attempt_id = %attempt_id,
                "Send attempt was interrupted before its outcome was recorded, not re-sending"
            );
            let next = status::failed(
                current,
                email.metadata.generation,
                FailureReason::OutcomeUnknown,
                format!(
                    "send attempt {attempt_id} was interrupted before its outcome was recorded; \
                     the email may or may not have been delivered"
                ),
            );
            ctx.store.update_email_status(email, &next).await?;
            metrics::increment_emails_failed(FailureReason::OutcomeUnknown.as_str());
            Ok(Action::await_change())
        }
    }
}
