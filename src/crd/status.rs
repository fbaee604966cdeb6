//! # Email Status
//!
//! Status types for tracking delivery state.

use serde::{Deserialize, Serialize};

/// Delivery phase of an `Email`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum EmailPhase {
    /// Accepted, waiting for a send attempt (also used between retryable failures)
    Pending,
    /// A send attempt has been recorded and may be in progress
    Sending,
    /// Delivered to the transport; `messageId` is set
    Sent,
    /// Terminal failure; `error` and `reason` are set
    Failed,
}

impl EmailPhase {
    /// Sent and Failed are final for the observed generation
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Sending => "Sending",
            Self::Sent => "Sent",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for EmailPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable cause of a Failed phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum FailureReason {
    /// Referenced `EmailSenderConfig` is missing or could not be read
    SenderConfigUnavailable,
    /// Transport answered with a non-retryable error status
    Rejected,
    /// Transport accepted the request but the response carried no usable message id
    MalformedResponse,
    /// Retryable failures exceeded the attempt limit
    AttemptsExhausted,
    /// A previous attempt was interrupted before its outcome was recorded
    OutcomeUnknown,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SenderConfigUnavailable => "SenderConfigUnavailable",
            Self::Rejected => "Rejected",
            Self::MalformedResponse => "MalformedResponse",
            Self::AttemptsExhausted => "AttemptsExhausted",
            Self::OutcomeUnknown => "OutcomeUnknown",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the Email resource
///
/// Optional fields serialize as `null` so a merge patch of the whole status
/// clears values left over from a previous phase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatus {
    /// Current delivery phase
    #[serde(default)]
    pub phase: Option<EmailPhase>,
    /// Transport message id, set when Sent
    #[serde(default)]
    pub message_id: Option<String>,
    /// Human-readable description of the last failure
    #[serde(default)]
    pub error: Option<String>,
    /// Machine-readable failure cause, set when Failed
    #[serde(default)]
    pub reason: Option<FailureReason>,
    /// Number of send attempts recorded so far
    #[serde(default)]
    pub attempts: u32,
    /// Identifier of the most recent send attempt
    #[serde(default)]
    pub attempt_id: Option<String>,
    /// Spec generation this status describes
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Start of the most recent send attempt (RFC3339)
    #[serde(default)]
    pub last_attempt_time: Option<String>,
    /// Last time the phase changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(EmailPhase::Sent.is_terminal());
        assert!(EmailPhase::Failed.is_terminal());
        assert!(!EmailPhase::Pending.is_terminal());
        assert!(!EmailPhase::Sending.is_terminal());
    }

    #[test]
    fn test_status_serializes_cleared_fields_as_null() {
        let status = EmailStatus {
            phase: Some(EmailPhase::Sent),
            message_id: Some("abc123".to_string()),
            attempts: 1,
            ..EmailStatus::default()
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["phase"], "Sent");
        assert_eq!(value["messageId"], "abc123");
        assert!(value["error"].is_null());
        assert!(value.as_object().unwrap().contains_key("error"));
    }

    #[test]
    fn test_status_deserializes_partial_object() {
        let status: EmailStatus = serde_json::from_str(r#"{"phase":"Failed","reason":"Rejected"}"#).unwrap();
        assert_eq!(status.phase, Some(EmailPhase::Failed));
        assert_eq!(status.reason, Some(FailureReason::Rejected));
        assert_eq!(status.attempts, 0);
    }
}
