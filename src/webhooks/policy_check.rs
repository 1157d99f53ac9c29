//! Existing-policy verification against the alerts API.

use tracing::{error, info};

use super::pipeline::AdmissionError;
use crate::alerts::{AlertsClientFactory, AlertsError, partial_api_key};
use crate::crd::{ConditionFields, KindRules};

/// Confirm the referenced alert policy exists (and, for kinds that require
/// it, that the API returned the policy that was asked for).
///
/// When `is_deleting` is set, a missing policy is tolerated: a condition
/// whose backing policy is already gone must not block its own removal.
pub async fn verify(
    factory: &dyn AlertsClientFactory,
    api_key: &str,
    fields: &ConditionFields<'_>,
    rules: KindRules,
    is_deleting: bool,
) -> Result<(), AdmissionError> {
    let client = factory.create(api_key, fields.region).map_err(|e| {
        error!(
            policy_id = %fields.policy_id,
            api_key = %partial_api_key(api_key),
            region = %fields.region,
            error = %e,
            "Failed to initialize alerts client"
        );
        AdmissionError::RemoteLookup(format!("failed to initialize alerts client: {}", e))
    })?;

    let lookup = if rules.account_scoped_lookup {
        client
            .query_policy_by_account(fields.account_id, &fields.policy_id.to_string())
            .await
    } else {
        match fields.policy_id.as_numeric() {
            Some(id) => client.get_policy(id).await,
            None => {
                return Err(AdmissionError::Configuration(format!(
                    "existing_policy_id {:?} is not numeric",
                    fields.policy_id.to_string()
                )));
            }
        }
    };

    let policy = match lookup {
        Ok(policy) => policy,
        Err(AlertsError::PolicyNotFound { .. }) if is_deleting => {
            info!(
                policy_id = %fields.policy_id,
                "Existing alert policy not found, but the condition is being deleted"
            );
            return Ok(());
        }
        Err(e) => {
            error!(
                policy_id = %fields.policy_id,
                api_key = %partial_api_key(api_key),
                region = %fields.region,
                error = %e,
                "Failed to get policy"
            );
            return Err(AdmissionError::RemoteLookup(format!(
                "failed to get policy {}: {}",
                fields.policy_id, e
            )));
        }
    };

    if rules.verify_policy_match && !fields.policy_id.matches(policy.id) {
        return Err(AdmissionError::Consistency {
            requested: fields.policy_id.to_string(),
            returned: policy.id,
        });
    }

    Ok(())
}
