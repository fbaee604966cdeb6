//! # Outcome Journal
//!
//! In-process record of send attempts whose outcome is not yet durable.
//!
//! An attempt is registered as in flight before its `Sending` marker is
//! written and completed with the status it produced. The entry is dropped
//! once that status is persisted. When persisting fails, the next reconcile
//! finds the completed entry and writes it without sending again.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::controller::store::ObjectKey;
use crate::crd::EmailStatus;

/// State of one send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// Registered; the transport call may still be running
    InFlight,
    /// Transport returned; this status has not been persisted yet
    Completed(EmailStatus),
}

#[derive(Debug, Default)]
pub struct OutcomeJournal {
    entries: Mutex<HashMap<(ObjectKey, String), JournalEntry>>,
}

impl OutcomeJournal {
    pub fn begin(&self, key: &ObjectKey, attempt_id: &str) {
        self.entries()
            .insert((key.clone(), attempt_id.to_string()), JournalEntry::InFlight);
    }

    pub fn complete(&self, key: &ObjectKey, attempt_id: &str, status: EmailStatus) {
        self.entries().insert(
            (key.clone(), attempt_id.to_string()),
            JournalEntry::Completed(status),
        );
    }

    #[must_use]
    pub fn lookup(&self, key: &ObjectKey, attempt_id: &str) -> Option<JournalEntry> {
        self.entries()
            .get(&(key.clone(), attempt_id.to_string()))
            .cloned()
    }

    pub fn forget(&self, key: &ObjectKey, attempt_id: &str) {
        self.entries().remove(&(key.clone(), attempt_id.to_string()));
    }

    /// Drop every entry for a deleted object
    pub fn forget_all(&self, key: &ObjectKey) {
        self.entries().retain(|(entry_key, _), _| entry_key != key);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<(ObjectKey, String), JournalEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
