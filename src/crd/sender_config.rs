//! # EmailSenderConfig Spec
//!
//! Sender identity and MailerSend credentials shared by `Email` resources.

use serde::{Deserialize, Serialize};

use crate::constants::SENDER_CONFIG_FINALIZER;

/// EmailSenderConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: email.example.com/v1
/// kind: EmailSenderConfig
/// metadata:
///   name: mailersend
///   namespace: default
/// spec:
///   from: noreply@example.com
///   apiToken: mlsn.xxxxxxxx
/// ```
#[derive(kube::CustomResource, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "EmailSenderConfig",
    group = "email.example.com",
    version = "v1",
    namespaced,
    shortname = "esc",
    printcolumn = r#"{"name":"From", "type":"string", "jsonPath":".spec.from"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EmailSenderConfigSpec {
    /// Sender address
    pub from: String,
    /// MailerSend API token, sent as a bearer credential
    pub api_token: String,
}

// Tokens must never reach logs
impl std::fmt::Debug for EmailSenderConfigSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSenderConfigSpec")
            .field("from", &self.from)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl EmailSenderConfig {
    /// True when the operator's finalizer is present
    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| finalizers.iter().any(|f| f == SENDER_CONFIG_FINALIZER))
    }

    /// True once `metadata.deletionTimestamp` is set
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Current finalizers, empty when unset
    #[must_use]
    pub fn finalizers(&self) -> Vec<String> {
        self.metadata.finalizers.clone().unwrap_or_default()
    }
}
