//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use email_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile_email, reconcile_sender_config, Reconciler, ReconcilerError,
};

// Seams for substituting the API server and the email provider
pub use crate::controller::store::{KubeStore, ObjectKey, ResourceStore, StoreError};
pub use crate::controller::transport::{
    EmailTransport, MailerSendTransport, OutboundEmail, SendReceipt, TransportError,
};

pub use crate::config::{Args, ControllerConfig};
