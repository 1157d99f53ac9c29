//! AlertsNrqlCondition Custom Resource Definition.
//!
//! NRQL alert condition targeting the account-scoped alerts API: the
//! referenced policy id is a string and the existence check is scoped by
//! account id. Update and delete admission perform no checks for this kind.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::{
    AlertCondition, AlertConditionTerm, ApiKeySecretRef, ConditionFields, KindRules, NrqlQuery,
    PolicyId,
};

/// AlertsNrqlCondition is a custom resource for NRQL alert conditions
/// attached to a pre-existing alert policy.
///
/// Example:
/// ```yaml
/// apiVersion: nr.k8s.newrelic.com/v1
/// kind: AlertsNrqlCondition
/// metadata:
///   name: high-error-rate
/// spec:
///   account_id: 1234567
///   region: US
///   existing_policy_id: "42"
///   api_key_secret:
///     name: newrelic
///     namespace: default
///     key_name: api_key
///   nrql:
///     query: SELECT count(*) FROM TransactionError
///     since_value: "5"
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "nr.k8s.newrelic.com",
    version = "v1",
    kind = "AlertsNrqlCondition",
    plural = "alertsnrqlconditions",
    status = "AlertsNrqlConditionStatus",
    namespaced,
    printcolumn = r#"{"name":"Policy", "type":"string", "jsonPath":".spec.existing_policy_id"}"#,
    printcolumn = r#"{"name":"Region", "type":"string", "jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct AlertsNrqlConditionSpec {
    /// Inline New Relic API key. Prefer `api_key_secret`.
    #[serde(default)]
    pub api_key: String,

    /// Reference to a secret holding the API key.
    #[serde(default)]
    pub api_key_secret: ApiKeySecretRef,

    /// New Relic account the policy belongs to.
    #[serde(default)]
    pub account_id: i32,

    /// New Relic region ("US" or "EU").
    #[serde(default)]
    pub region: String,

    /// Id of the pre-existing alert policy this condition attaches to.
    #[serde(default)]
    pub existing_policy_id: String,

    /// Condition name shown in the New Relic UI.
    #[serde(default)]
    pub name: String,

    /// Whether the condition is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// The NRQL query evaluated by the condition.
    #[serde(default)]
    pub nrql: NrqlQuery,

    /// Threshold terms.
    #[serde(default)]
    pub terms: Vec<AlertConditionTerm>,

    /// Runbook link attached to violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runbook_url: Option<String>,

    /// Seconds after which open violations are force-closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_time_limit_seconds: Option<i32>,
}

/// Status of an AlertsNrqlCondition.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct AlertsNrqlConditionStatus {
    /// Snapshot of the spec last applied against New Relic.
    /// Written by the reconciler after a successful remote apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_spec: Option<AlertsNrqlConditionSpec>,

    /// Id of the condition created in New Relic, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_id: Option<i64>,
}

impl AlertCondition for AlertsNrqlCondition {
    fn rules() -> KindRules {
        KindRules {
            account_scoped_lookup: true,
            verify_policy_match: false,
            update_runs_checks: false,
            delete_verifies_policy: false,
        }
    }

    fn fields(&self) -> ConditionFields<'_> {
        ConditionFields {
            api_key: &self.spec.api_key,
            api_key_secret: &self.spec.api_key_secret,
            region: &self.spec.region,
            account_id: self.spec.account_id,
            policy_id: PolicyId::Text(self.spec.existing_policy_id.clone()),
        }
    }

    fn default_applied_spec(&mut self) {
        let status = self.status.get_or_insert_with(Default::default);
        if status.applied_spec.is_none() {
            status.applied_spec = Some(AlertsNrqlConditionSpec::default());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_wire_format_is_snake_case() {
        let spec = AlertsNrqlConditionSpec {
            api_key_secret: ApiKeySecretRef {
                name: "nr".into(),
                namespace: "default".into(),
                key_name: "api_key".into(),
            },
            existing_policy_id: "42".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["existing_policy_id"], "42");
        assert_eq!(value["api_key_secret"]["key_name"], "api_key");
    }

    #[test]
    fn test_policy_id_is_textual() {
        let condition = AlertsNrqlCondition::new(
            "test",
            AlertsNrqlConditionSpec {
                existing_policy_id: "42".into(),
                ..Default::default()
            },
        );
        assert_eq!(condition.fields().policy_id, PolicyId::Text("42".into()));
        // Empty string counts as missing for this kind.
        let empty = AlertsNrqlCondition::new("test", AlertsNrqlConditionSpec::default());
        assert!(empty.fields().policy_id.is_missing());
    }

    #[test]
    fn test_default_applied_spec_initializes_once() {
        let mut condition = AlertsNrqlCondition::new(
            "test",
            AlertsNrqlConditionSpec {
                region: "US".into(),
                ..Default::default()
            },
        );
        assert!(condition.status.is_none());

        condition.default_applied_spec();
        let applied = condition
            .status
            .as_ref()
            .and_then(|s| s.applied_spec.as_ref())
            .expect("applied spec initialized");
        assert_eq!(applied.region, "");

        // A second pass must not replace the existing value.
        condition
            .status
            .as_mut()
            .unwrap()
            .applied_spec
            .as_mut()
            .unwrap()
            .region = "EU".into();
        condition.default_applied_spec();
        assert_eq!(
            condition.status.unwrap().applied_spec.unwrap().region,
            "EU"
        );
    }
}
