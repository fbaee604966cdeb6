//! # Types
//!
//! Core types for the reconcilers.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::journal::OutcomeJournal;
use crate::controller::store::{ObjectKey, ResourceStore, StoreError};
use crate::controller::transport::{EmailTransport, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("send attempt {attempt} for {key} failed and will be retried: {source}")]
    TransientTransport {
        key: ObjectKey,
        attempt: u32,
        #[source]
        source: TransportError,
    },

    #[error("outcome of send attempt {attempt_id} for {key} could not be recorded: {source}")]
    OutcomeNotPersisted {
        key: ObjectKey,
        attempt_id: String,
        #[source]
        source: StoreError,
    },

    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl ReconcilerError {
    /// True when a conditional write lost an optimistic-concurrency race
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_conflict())
    }

    /// Short label for metrics
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Store(err) => err.kind(),
            Self::TransientTransport { source, .. } => source.kind(),
            Self::OutcomeNotPersisted { .. } => "outcome_not_persisted",
            Self::InvalidObject(_) => "invalid_object",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Shared context handed to both reconcilers
///
/// Store and transport are injected so tests can substitute doubles.
pub struct Reconciler {
    pub store: Arc<dyn ResourceStore>,
    pub transport: Arc<dyn EmailTransport>,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by controller:namespace/name)
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
    pub outcomes: OutcomeJournal,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("outcomes", &self.outcomes)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        transport: Arc<dyn EmailTransport>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            backoff_states: Mutex::new(HashMap::new()),
            outcomes: OutcomeJournal::default(),
        }
    }

    /// Advance the backoff for `resource_key`, returning the delay and error count
    pub fn next_backoff(&self, resource_key: &str) -> (Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(resource_key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
        });
        state.increment_error();
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Forget the backoff for `resource_key` after a successful reconcile
    pub fn reset_backoff(&self, resource_key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(resource_key);
    }
}

/// Backoff key shared by the reconcilers and the error policy
#[must_use]
pub fn backoff_key(controller: &str, key: &ObjectKey) -> String {
    format!("{controller}:{key}")
}
