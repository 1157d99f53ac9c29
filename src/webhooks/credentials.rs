//! API key resolution for admission validation.
//!
//! An inline `api_key` wins; otherwise the key is read from the referenced
//! secret. The secret read is a single idempotent GET, wrapped in a bounded
//! timeout and one retry so a slow API server cannot hold the admission path
//! open (the webhooks are registered fail-closed).

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::{debug, warn};

use super::pipeline::AdmissionError;
use crate::crd::ConditionFields;

/// Timeout for a single secret read.
pub const SECRET_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Total attempts per secret read (first try plus retries).
const SECRET_LOOKUP_ATTEMPTS: u32 = 2;
/// Pause between attempts.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Read access to Kubernetes secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error>;
}

/// Secret store backed by the cluster API.
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await
    }
}

/// Resolve the API key for a condition spec.
///
/// The resolved key is not validated for shape: a secret that exists but
/// lacks `key_name` yields an empty string, which later fails at the alerts
/// API rather than here.
pub async fn resolve(
    store: &dyn SecretStore,
    fields: &ConditionFields<'_>,
) -> Result<String, AdmissionError> {
    if !fields.api_key.is_empty() {
        return Ok(fields.api_key.to_string());
    }

    let secret_ref = fields.api_key_secret;
    debug!(
        namespace = %secret_ref.namespace,
        name = %secret_ref.name,
        key_name = %secret_ref.key_name,
        "Resolving API key from secret"
    );
    let secret = get_with_retry(store, &secret_ref.namespace, &secret_ref.name).await?;

    let api_key = secret
        .data
        .as_ref()
        .and_then(|data| data.get(&secret_ref.key_name))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
        .unwrap_or_default();
    Ok(api_key)
}

async fn get_with_retry(
    store: &dyn SecretStore,
    namespace: &str,
    name: &str,
) -> Result<Secret, AdmissionError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match tokio::time::timeout(SECRET_LOOKUP_TIMEOUT, store.get(namespace, name)).await {
            Ok(Ok(secret)) => return Ok(secret),
            Ok(Err(e)) if attempt < SECRET_LOOKUP_ATTEMPTS && is_retryable(&e) => {
                warn!(attempt, namespace, name, error = %e, "Secret read failed, retrying");
            }
            Ok(Err(e)) => {
                return Err(AdmissionError::RemoteLookup(format!(
                    "failed to get secret {}/{}: {}",
                    namespace, name, e
                )));
            }
            Err(_) if attempt < SECRET_LOOKUP_ATTEMPTS => {
                warn!(attempt, namespace, name, "Secret read timed out, retrying");
            }
            Err(_) => {
                return Err(AdmissionError::RemoteLookup(format!(
                    "timed out after {:?} getting secret {}/{}",
                    SECRET_LOOKUP_TIMEOUT, namespace, name
                )));
            }
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
}

/// Server errors and throttling are worth one more attempt; not-found and
/// access-denied are not.
fn is_retryable(error: &kube::Error) -> bool {
    match error {
        kube::Error::Api(e) => e.code >= 500 || e.code == 429,
        kube::Error::Service(_) => true,
        _ => false,
    }
}
