//! # Outbound Transport
//!
//! The side-effecting half of `Email` reconciliation: one HTTP call that
//! hands a message to the delivery provider.
//!
//! ## Module Structure
//!
//! - `mailersend.rs` - MailerSend REST implementation

mod mailersend;

pub use mailersend::MailerSendTransport;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroizing;

#[cfg(test)]
use mockall::automock;

use crate::crd::{Email, EmailSenderConfig};

/// A message ready to hand to the transport
#[derive(Clone)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub api_token: Zeroizing<String>,
}

impl OutboundEmail {
    /// Combine an `Email` with the sender it references
    #[must_use]
    pub fn new(email: &Email, sender: &EmailSenderConfig) -> Self {
        Self {
            from: sender.spec.from.clone(),
            to: email.spec.to.clone(),
            subject: email.spec.subject.clone(),
            html: email.spec.body.clone(),
            api_token: Zeroizing::new(sender.spec.api_token.clone()),
        }
    }
}

impl fmt::Debug for OutboundEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundEmail")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("api_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Provider acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: String,
}

/// Transport failures, split by whether a later attempt may succeed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("send timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("transport returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport accepted the request but the response was unusable: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    /// Network failures, timeouts, 5xx, 408 and 429 may succeed on a later attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::MalformedResponse(_) => false,
        }
    }

    /// Short label for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
            Self::Status { status, .. } if *status >= 500 => "server_error",
            Self::Status { .. } => "client_error",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Delivery seam used by the `Email` reconciler
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Submit one message; must give up after the transport's configured timeout
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, TransportError>;
}
