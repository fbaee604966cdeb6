//! # Status Transitions
//!
//! Builders for the `Email` statuses the reconciler writes.
//!
//! Each builder starts from the previous status so `attempts` and
//! `attemptId` survive, and stamps `lastTransitionTime` only when the phase
//! actually changes.

use crate::crd::{EmailPhase, EmailStatus, FailureReason};

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn transition(previous: &EmailStatus, phase: EmailPhase) -> EmailStatus {
    let mut next = previous.clone();
    if previous.phase != Some(phase) {
        next.last_transition_time = Some(now());
    }
    next.phase = Some(phase);
    next
}

/// Write-ahead marker for a new attempt
#[must_use]
pub fn sending(previous: &EmailStatus, generation: Option<i64>, attempt_id: &str) -> EmailStatus {
    let mut next = transition(previous, EmailPhase::Sending);
    next.attempts = previous.attempts.saturating_add(1);
    next.attempt_id = Some(attempt_id.to_string());
    next.last_attempt_time = Some(now());
    next.observed_generation = generation;
    next.message_id = None;
    next.reason = None;
    next
}

#[must_use]
pub fn sent(previous: &EmailStatus, message_id: String) -> EmailStatus {
    let mut next = transition(previous, EmailPhase::Sent);
    next.message_id = Some(message_id);
    next.error = None;
    next.reason = None;
    next
}

#[must_use]
pub fn failed(
    previous: &EmailStatus,
    generation: Option<i64>,
    reason: FailureReason,
    error: String,
) -> EmailStatus {
    let mut next = transition(previous, EmailPhase::Failed);
    next.message_id = None;
    next.error = Some(error);
    next.reason = Some(reason);
    next.observed_generation = generation.or(previous.observed_generation);
    next
}

/// Back to Pending after a retryable failure; `error` keeps the last cause
#[must_use]
pub fn retrying(previous: &EmailStatus, error: String) -> EmailStatus {
    let mut next = transition(previous, EmailPhase::Pending);
    next.error = Some(error);
    next.reason = None;
    next
}
