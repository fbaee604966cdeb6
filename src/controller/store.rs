//! # Resource Store
//!
//! Read and conditional-write access to `Email` and `EmailSenderConfig`
//! objects.
//!
//! Every write carries the `resourceVersion` the caller last read, so the API
//! server rejects it with 409 when another writer got there first. That
//! compare-and-swap is the only concurrency control the reconcilers rely on.

use std::fmt;

use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::constants::FIELD_MANAGER;
use crate::crd::{Email, EmailSenderConfig, EmailStatus};

/// Namespace-scoped identity of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced resource; cluster-scoped objects get an empty namespace
    pub fn from_resource<K: Resource>(resource: &K) -> Self {
        Self::new(resource.namespace().unwrap_or_default(), resource.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Errors returned by a [`ResourceStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} was modified concurrently (expected resourceVersion {resource_version})")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
        resource_version: String,
    },

    #[error("{kind} {namespace}/{name} has no resourceVersion; refusing unconditional write")]
    MissingResourceVersion {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to encode patch: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// True when a conditional write lost an optimistic-concurrency race
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Short label for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::MissingResourceVersion { .. } => "missing_resource_version",
            Self::Kube(_) => "kube",
            Self::Encode(_) => "encode",
        }
    }
}

/// Store seam used by both reconcilers
///
/// Reads return `Ok(None)` for missing objects. Writes are conditioned on the
/// `resourceVersion` of the object passed in and return the updated object.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get an Email by identity
    async fn get_email(&self, namespace: &str, name: &str) -> Result<Option<Email>, StoreError>;

    /// List all Emails in a namespace
    async fn list_emails(&self, namespace: &str) -> Result<Vec<Email>, StoreError>;

    /// Replace the status of `email`, conditioned on its resourceVersion
    async fn update_email_status(
        &self,
        email: &Email,
        status: &EmailStatus,
    ) -> Result<Email, StoreError>;

    /// Get an EmailSenderConfig by identity
    async fn get_sender_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EmailSenderConfig>, StoreError>;

    /// Replace the finalizer list of `config`, conditioned on its resourceVersion
    async fn update_sender_config_finalizers(
        &self,
        config: &EmailSenderConfig,
        finalizers: &[String],
    ) -> Result<EmailSenderConfig, StoreError>;
}

/// Kubernetes API server implementation
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    /// Create a new KubeStore wrapping the given client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        }
    }
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == code)
}

fn resource_version_of<K: Resource>(kind: &'static str, resource: &K) -> Result<String, StoreError> {
    resource
        .resource_version()
        .ok_or_else(|| StoreError::MissingResourceVersion {
            kind,
            namespace: resource.namespace().unwrap_or_default(),
            name: resource.name_any(),
        })
}

/// Translate 404/409 on a write into the store's own variants
fn map_write_error(kind: &'static str, key: &ObjectKey, resource_version: &str, err: kube::Error) -> StoreError {
    if is_status(&err, 404) {
        StoreError::NotFound {
            kind,
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    } else if is_status(&err, 409) {
        StoreError::Conflict {
            kind,
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            resource_version: resource_version.to_string(),
        }
    } else {
        StoreError::Kube(err)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_email(&self, namespace: &str, name: &str) -> Result<Option<Email>, StoreError> {
        let api: Api<Email> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_emails(&self, namespace: &str) -> Result<Vec<Email>, StoreError> {
        let api: Api<Email> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn update_email_status(
        &self,
        email: &Email,
        status: &EmailStatus,
    ) -> Result<Email, StoreError> {
        let key = ObjectKey::from_resource(email);
        let resource_version = resource_version_of("Email", email)?;
        let api: Api<Email> = Api::namespaced(self.client.clone(), &key.namespace);

        // resourceVersion in a merge patch turns it into a precondition
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": resource_version },
            "status": serde_json::to_value(status)?,
        });

        let updated = api
            .patch_status(&key.name, &Self::params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_write_error("Email", &key, &resource_version, e))?;

        debug!(
            resource.namespace = %key.namespace,
            resource.name = %key.name,
            resource_version = ?updated.resource_version(),
            "Email status updated"
        );
        Ok(updated)
    }

    async fn get_sender_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EmailSenderConfig>, StoreError> {
        let api: Api<EmailSenderConfig> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn update_sender_config_finalizers(
        &self,
        config: &EmailSenderConfig,
        finalizers: &[String],
    ) -> Result<EmailSenderConfig, StoreError> {
        let key = ObjectKey::from_resource(config);
        let resource_version = resource_version_of("EmailSenderConfig", config)?;
        let api: Api<EmailSenderConfig> = Api::namespaced(self.client.clone(), &key.namespace);

        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": resource_version,
                "finalizers": finalizers,
            }
        });

        let updated = api
            .patch(&key.name, &Self::params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_write_error("EmailSenderConfig", &key, &resource_version, e))?;

        debug!(
            resource.namespace = %key.namespace,
            resource.name = %key.name,
            finalizers = ?finalizers,
            "EmailSenderConfig finalizers updated"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "test".to_string(),
            code,
        })
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("default", "welcome").to_string(), "default/welcome");
    }

    #[test]
    fn test_write_errors_are_classified() {
        let key = ObjectKey::new("default", "welcome");

        let err = map_write_error("Email", &key, "7", api_error(409));
        assert!(err.is_conflict());

        let err = map_write_error("Email", &key, "7", api_error(404));
        assert!(matches!(err, StoreError::NotFound { kind: "Email", .. }));

        let err = map_write_error("Email", &key, "7", api_error(500));
        assert!(matches!(err, StoreError::Kube(_)));
        assert_eq!(err.kind(), "kube");
    }
}
