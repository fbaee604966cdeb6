//! Common test utilities for integration tests
//!
//! - `init_rustls` - crypto provider setup for tests that build HTTP clients
//! - `InMemoryStore` - `ResourceStore` with resourceVersion compare-and-swap
//! - `ScriptedTransport` - `EmailTransport` that replays canned outcomes
//! - fixtures for `Email`, `EmailSenderConfig` and the reconciler context

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use email_operator::config::ControllerConfig;
use email_operator::controller::reconciler::Reconciler;
use email_operator::controller::store::{ObjectKey, ResourceStore, StoreError};
use email_operator::controller::transport::{
    EmailTransport, OutboundEmail, SendReceipt, TransportError,
};
use email_operator::crd::{
    Email, EmailSenderConfig, EmailSenderConfigSpec, EmailSpec, EmailStatus,
};

pub const NAMESPACE: &str = "default";
pub const SENDER: &str = "mailersend";

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` so it is only installed once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

#[derive(Default)]
struct State {
    emails: BTreeMap<ObjectKey, Email>,
    sender_configs: BTreeMap<ObjectKey, EmailSenderConfig>,
    next_resource_version: u64,
    fail_status_write_after: Option<usize>,
    status_writes: usize,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_resource_version += 1;
        self.next_resource_version.to_string()
    }
}

/// In-memory API server for the two kinds the operator touches
///
/// Writes are rejected with `StoreError::Conflict` when the resourceVersion
/// of the object passed in is stale. Spec edits bump `metadata.generation`,
/// status writes do not.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Insert an `Email` as the API server would on create
    pub fn create_email(&self, mut email: Email) -> Email {
        let mut state = self.lock();
        email.metadata.namespace.get_or_insert_with(|| NAMESPACE.to_string());
        email.metadata.generation = Some(email.metadata.generation.unwrap_or(1));
        email.metadata.resource_version = Some(state.bump());
        state
            .emails
            .insert(ObjectKey::from_resource(&email), email.clone());
        email
    }

    /// Insert an `EmailSenderConfig` as the API server would on create
    pub fn create_sender_config(&self, mut config: EmailSenderConfig) -> EmailSenderConfig {
        let mut state = self.lock();
        config.metadata.namespace.get_or_insert_with(|| NAMESPACE.to_string());
        config.metadata.resource_version = Some(state.bump());
        state
            .sender_configs
            .insert(ObjectKey::from_resource(&config), config.clone());
        config
    }

    pub fn email(&self, name: &str) -> Option<Email> {
        self.lock()
            .emails
            .get(&ObjectKey::new(NAMESPACE, name))
            .cloned()
    }

    pub fn status(&self, name: &str) -> EmailStatus {
        self.email(name)
            .and_then(|email| email.status)
            .unwrap_or_default()
    }

    pub fn sender_config(&self, name: &str) -> Option<EmailSenderConfig> {
        self.lock()
            .sender_configs
            .get(&ObjectKey::new(NAMESPACE, name))
            .cloned()
    }

    /// Edit the spec of an `Email`, bumping generation and resourceVersion
    pub fn edit_email_spec(&self, name: &str, edit: impl FnOnce(&mut EmailSpec)) {
        let mut state = self.lock();
        let resource_version = state.bump();
        let email = state
            .emails
            .get_mut(&ObjectKey::new(NAMESPACE, name))
            .expect("email exists");
        edit(&mut email.spec);
        email.metadata.generation = Some(email.metadata.generation.unwrap_or(1) + 1);
        email.metadata.resource_version = Some(resource_version);
    }

    /// Overwrite the status of an `Email` directly, bypassing preconditions
    pub fn set_status(&self, name: &str, status: EmailStatus) {
        let mut state = self.lock();
        let resource_version = state.bump();
        let email = state
            .emails
            .get_mut(&ObjectKey::new(NAMESPACE, name))
            .expect("email exists");
        email.status = Some(status);
        email.metadata.resource_version = Some(resource_version);
    }

    /// Move `lastAttemptTime` of an `Email` into the past, as if `elapsed` had gone by
    ///
    /// The object itself is unchanged, so resourceVersion stays as it is.
    pub fn backdate_last_attempt(&self, name: &str, elapsed: Duration) {
        let mut state = self.lock();
        let status = state
            .emails
            .get_mut(&ObjectKey::new(NAMESPACE, name))
            .and_then(|email| email.status.as_mut())
            .expect("email has a status");
        let last_attempt = status
            .last_attempt_time
            .as_deref()
            .map(|time| chrono::DateTime::parse_from_rfc3339(time).expect("RFC3339 time"))
            .expect("an attempt was made");
        let elapsed = chrono::Duration::from_std(elapsed).expect("duration in range");
        status.last_attempt_time = Some((last_attempt - elapsed).to_rfc3339());
    }

    /// Delete an `EmailSenderConfig`; objects with finalizers are only marked
    pub fn delete_sender_config(&self, name: &str) {
        let mut state = self.lock();
        let key = ObjectKey::new(NAMESPACE, name);
        let has_finalizers = state
            .sender_configs
            .get(&key)
            .is_some_and(|config| !config.finalizers().is_empty());
        if !has_finalizers {
            state.sender_configs.remove(&key);
            return;
        }
        let resource_version = state.bump();
        if let Some(config) = state.sender_configs.get_mut(&key) {
            config.metadata.deletion_timestamp = Some(deletion_timestamp());
            config.metadata.resource_version = Some(resource_version);
        }
    }

    /// Let `successes` status writes through, then fail the next one
    pub fn fail_status_write_after(&self, successes: usize) {
        self.lock().fail_status_write_after = Some(successes);
    }

    /// Number of status writes accepted so far
    pub fn status_writes(&self) -> usize {
        self.lock().status_writes
    }
}

fn check_resource_version(
    kind: &'static str,
    key: &ObjectKey,
    expected: Option<&String>,
    stored: Option<&String>,
) -> Result<(), StoreError> {
    let Some(expected) = expected else {
        return Err(StoreError::MissingResourceVersion {
            kind,
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        });
    };
    if Some(expected) != stored {
        return Err(StoreError::Conflict {
            kind,
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            resource_version: expected.clone(),
        });
    }
    Ok(())
}

fn not_found(kind: &'static str, key: &ObjectKey) -> StoreError {
    StoreError::NotFound {
        kind,
        namespace: key.namespace.clone(),
        name: key.name.clone(),
    }
}

pub fn server_error() -> StoreError {
    StoreError::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: "etcdserver: request timed out".to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_email(&self, namespace: &str, name: &str) -> Result<Option<Email>, StoreError> {
        Ok(self.lock().emails.get(&ObjectKey::new(namespace, name)).cloned())
    }

    async fn list_emails(&self, namespace: &str) -> Result<Vec<Email>, StoreError> {
        Ok(self
            .lock()
            .emails
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .map(|(_, email)| email.clone())
            .collect())
    }

    async fn update_email_status(
        &self,
        email: &Email,
        status: &EmailStatus,
    ) -> Result<Email, StoreError> {
        let key = ObjectKey::from_resource(email);
        let mut state = self.lock();

        match state.fail_status_write_after {
            Some(0) => {
                state.fail_status_write_after = None;
                return Err(server_error());
            }
            Some(n) => state.fail_status_write_after = Some(n - 1),
            None => {}
        }

        let stored_version = state
            .emails
            .get(&key)
            .ok_or_else(|| not_found("Email", &key))?
            .metadata
            .resource_version
            .clone();
        check_resource_version(
            "Email",
            &key,
            email.metadata.resource_version.as_ref(),
            stored_version.as_ref(),
        )?;

        let resource_version = state.bump();
        state.status_writes += 1;
        let stored = state.emails.get_mut(&key).ok_or_else(|| not_found("Email", &key))?;
        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(resource_version);
        Ok(stored.clone())
    }

    async fn get_sender_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EmailSenderConfig>, StoreError> {
        Ok(self
            .lock()
            .sender_configs
            .get(&ObjectKey::new(namespace, name))
            .cloned())
    }

    async fn update_sender_config_finalizers(
        &self,
        config: &EmailSenderConfig,
        finalizers: &[String],
    ) -> Result<EmailSenderConfig, StoreError> {
        let key = ObjectKey::from_resource(config);
        let mut state = self.lock();

        let stored_version = state
            .sender_configs
            .get(&key)
            .ok_or_else(|| not_found("EmailSenderConfig", &key))?
            .metadata
            .resource_version
            .clone();
        check_resource_version(
            "EmailSenderConfig",
            &key,
            config.metadata.resource_version.as_ref(),
            stored_version.as_ref(),
        )?;

        let resource_version = state.bump();
        let stored = state
            .sender_configs
            .get_mut(&key)
            .ok_or_else(|| not_found("EmailSenderConfig", &key))?;
        stored.metadata.finalizers = Some(finalizers.to_vec());
        stored.metadata.resource_version = Some(resource_version);
        let updated = stored.clone();

        // The API server removes a deleting object once its finalizers are gone
        if updated.is_being_deleted() && finalizers.is_empty() {
            state.sender_configs.remove(&key);
        }
        Ok(updated)
    }
}

/// Transport double that replays scripted outcomes, then succeeds
#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<SendReceipt, TransportError>>>,
    repeat: Mutex<Option<Result<SendReceipt, TransportError>>>,
    delay: Option<Duration>,
    calls: AtomicU32,
    sent: Mutex<Vec<OutboundEmail>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every send for `delay` before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue outcomes returned by the next sends, in order
    pub fn push(&self, outcome: Result<SendReceipt, TransportError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Return `outcome` for every send once the queue is empty
    pub fn always(&self, outcome: Result<SendReceipt, TransportError>) {
        *self.repeat.lock().unwrap() = Some(outcome);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for ScriptedTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(email.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.outcomes.lock().unwrap().pop_front();
        scripted
            .or_else(|| self.repeat.lock().unwrap().clone())
            .unwrap_or_else(|| {
                Ok(SendReceipt {
                    message_id: format!("msg-{call}"),
                })
            })
    }
}

pub fn unavailable() -> TransportError {
    TransportError::Status {
        status: 503,
        body: r#"{"message":"Service Unavailable"}"#.to_string(),
    }
}

pub fn unauthenticated() -> TransportError {
    TransportError::Status {
        status: 401,
        body: r#"{"message":"Unauthenticated."}"#.to_string(),
    }
}

pub fn deletion_timestamp() -> k8s_openapi::apimachinery::pkg::apis::meta::v1::Time {
    serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap()
}

pub fn email(name: &str) -> Email {
    email_for(name, SENDER)
}

pub fn email_for(name: &str, sender: &str) -> Email {
    let mut email = Email::new(
        name,
        EmailSpec {
            sender_config_name: sender.to_string(),
            to: format!("{name}@example.com"),
            subject: "Welcome aboard".to_string(),
            body: "<h1>Welcome</h1>".to_string(),
        },
    );
    email.metadata.namespace = Some(NAMESPACE.to_string());
    email
}

pub fn sender_config(name: &str) -> EmailSenderConfig {
    let mut config = EmailSenderConfig::new(
        name,
        EmailSenderConfigSpec {
            from: "noreply@example.com".to_string(),
            api_token: "mlsn.test-token".to_string(),
        },
    );
    config.metadata.namespace = Some(NAMESPACE.to_string());
    config
}

pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        transport_timeout_secs: 1,
        max_send_attempts: 3,
        ..ControllerConfig::default()
    }
}

pub fn reconciler(
    store: &Arc<InMemoryStore>,
    transport: &Arc<ScriptedTransport>,
    config: ControllerConfig,
) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(
        Arc::<InMemoryStore>::clone(store),
        Arc::<ScriptedTransport>::clone(transport),
        config,
    ))
}
