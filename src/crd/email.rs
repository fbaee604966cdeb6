//! # Email Spec
//!
//! A single message-send request.

use serde::{Deserialize, Serialize};

/// Email Custom Resource Definition
///
/// Declares one email to deliver through the sender referenced by
/// `senderConfigName` (an `EmailSenderConfig` in the same namespace).
///
/// # Example
///
/// ```yaml
/// apiVersion: email.example.com/v1
/// kind: Email
/// metadata:
///   name: welcome
///   namespace: default
/// spec:
///   senderConfigName: mailersend
///   to: someone@example.com
///   subject: Welcome
///   body: "<p>Hello!</p>"
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Email",
    group = "email.example.com",
    version = "v1",
    namespaced,
    status = "crate::crd::EmailStatus",
    shortname = "em",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Message ID", "type":"string", "jsonPath":".status.messageId"}, {"name":"Reason", "type":"string", "jsonPath":".status.reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EmailSpec {
    /// Name of the `EmailSenderConfig` in the same namespace
    pub sender_config_name: String,
    /// Recipient address
    pub to: String,
    pub subject: String,
    /// HTML body
    pub body: String,
}

impl Email {
    /// True once `metadata.deletionTimestamp` is set
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Current phase, `None` when the status has never been written
    #[must_use]
    pub fn phase(&self) -> Option<crate::crd::EmailPhase> {
        self.status.as_ref().and_then(|status| status.phase)
    }
}
