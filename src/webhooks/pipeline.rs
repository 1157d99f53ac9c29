//! Validation pipeline for admission requests.
//!
//! One generic pipeline serves both condition kinds; everything kind-specific
//! comes from [`KindRules`] and the field view on the [`AlertCondition`]
//! trait. The per-event behavior is deliberately asymmetric between the two
//! kinds and is preserved as-is (see `KindRules`):
//!
//! | Event  | AlertsNrqlCondition        | NrqlAlertCondition              |
//! |--------|----------------------------|---------------------------------|
//! | Create | credential, fields, policy | credential, fields, policy      |
//! | Update | no checks                  | credential, fields, policy      |
//! | Delete | no checks                  | policy only, not-found tolerated|

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::{credentials, policy_check};
use crate::alerts::AlertsClientFactory;
use crate::crd::{AlertCondition, ConditionFields};
use crate::webhooks::credentials::SecretStore;

/// Error type for admission validation.
///
/// Every variant becomes the denial message verbatim; nothing is retried at
/// this level.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The caller supplied an unusable spec.
    #[error("{0}")]
    Configuration(String),

    /// A secret-store or alerts API call failed.
    #[error("{0}")]
    RemoteLookup(String),

    /// The alerts API returned a different policy than was requested.
    #[error("alert policy returned by API did not match: requested {requested}, got {returned}")]
    Consistency { requested: String, returned: i64 },
}

impl AdmissionError {
    /// Short machine-readable reason embedded in the denial message.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::Configuration(_) => "InvalidConfiguration",
            AdmissionError::RemoteLookup(_) => "RemoteLookupFailed",
            AdmissionError::Consistency { .. } => "PolicyMismatch",
        }
    }
}

/// Lifecycle event being validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionEvent {
    Create,
    Update,
    Delete,
}

/// Collaborators the pipeline needs, constructed once at startup and shared
/// immutably across concurrent admission calls.
#[derive(Clone)]
pub struct WebhookDeps {
    pub secrets: Arc<dyn SecretStore>,
    pub alerts: Arc<dyn AlertsClientFactory>,
}

impl WebhookDeps {
    pub fn new(secrets: Arc<dyn SecretStore>, alerts: Arc<dyn AlertsClientFactory>) -> Self {
        Self { secrets, alerts }
    }
}

/// Validate a condition for the given lifecycle event.
///
/// Checks short-circuit on the first failure and perform no mutation.
pub async fn validate<K: AlertCondition>(
    deps: &WebhookDeps,
    resource: &K,
    event: AdmissionEvent,
) -> Result<(), AdmissionError> {
    let rules = K::rules();
    let fields = resource.fields();
    let is_deleting =
        event == AdmissionEvent::Delete || resource.meta().deletion_timestamp.is_some();

    let run_full_checks = match event {
        AdmissionEvent::Create => true,
        AdmissionEvent::Update => rules.update_runs_checks,
        AdmissionEvent::Delete => false,
    };

    if run_full_checks {
        check_credential_source(&fields)?;
        check_required_fields(&fields)?;
    }

    let verify_policy = run_full_checks
        || (event == AdmissionEvent::Delete && rules.delete_verifies_policy);
    if verify_policy {
        let api_key = credentials::resolve(deps.secrets.as_ref(), &fields).await?;
        policy_check::verify(deps.alerts.as_ref(), &api_key, &fields, rules, is_deleting).await?;
    } else {
        debug!(?event, "No validation checks configured for this event");
    }

    Ok(())
}

/// Exactly one credential source must be usable: an inline key, or a fully
/// populated secret reference.
fn check_credential_source(fields: &ConditionFields<'_>) -> Result<(), AdmissionError> {
    if !fields.api_key.is_empty() || fields.api_key_secret.is_complete() {
        return Ok(());
    }
    Err(AdmissionError::Configuration(
        "either api_key or api_key_secret must be set".to_string(),
    ))
}

/// Collect every missing required field and report them in one error,
/// names joined with "and".
fn check_required_fields(fields: &ConditionFields<'_>) -> Result<(), AdmissionError> {
    let mut missing = Vec::new();

    if fields.region.is_empty() {
        missing.push("region");
    }
    if fields.policy_id.is_missing() {
        missing.push("existing_policy_id");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AdmissionError::Configuration(format!(
            "{} must be set",
            missing.join(" and ")
        )))
    }
}
