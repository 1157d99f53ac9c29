//! NrqlAlertCondition Custom Resource Definition.
//!
//! NRQL alert condition using the id-scoped alerts API: the referenced policy
//! id is numeric, the lookup is not account-scoped, and the returned policy id
//! is re-verified against the requested one. This kind runs the full create
//! checks on update too, and verifies the policy (tolerating not-found) on
//! delete.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::{
    AlertCondition, AlertConditionTerm, ApiKeySecretRef, ConditionFields, KindRules, NrqlQuery,
    PolicyId,
};

/// NrqlAlertCondition is a custom resource for NRQL alert conditions
/// attached to a pre-existing alert policy by numeric id.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "nr.k8s.newrelic.com",
    version = "v1",
    kind = "NrqlAlertCondition",
    plural = "nrqlalertconditions",
    status = "NrqlAlertConditionStatus",
    namespaced,
    printcolumn = r#"{"name":"Policy", "type":"integer", "jsonPath":".spec.existing_policy_id"}"#,
    printcolumn = r#"{"name":"Region", "type":"string", "jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct NrqlAlertConditionSpec {
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

    /// Numeric id of the pre-existing alert policy. Zero means unset.
    #[serde(default)]
    pub existing_policy_id: i64,

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

    /// Minutes after which open violations are force-closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_close_timer: Option<i32>,
}

/// Status of an NrqlAlertCondition.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct NrqlAlertConditionStatus {
    /// Snapshot of the spec last applied against New Relic.
    /// Written by the reconciler after a successful remote apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_spec: Option<NrqlAlertConditionSpec>,

    /// Id of the condition created in New Relic, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_id: Option<i64>,
}

impl AlertCondition for NrqlAlertCondition {
    fn rules() -> KindRules {
        KindRules {
            account_scoped_lookup: false,
            verify_policy_match: true,
            update_runs_checks: true,
            delete_verifies_policy: true,
        }
    }

    fn fields(&self) -> ConditionFields<'_> {
        ConditionFields {
            api_key: &self.spec.api_key,
            api_key_secret: &self.spec.api_key_secret,
            region: &self.spec.region,
            account_id: self.spec.account_id,
            policy_id: PolicyId::Numeric(self.spec.existing_policy_id),
        }
    }

    fn default_applied_spec(&mut self) {
        let status = self.status.get_or_insert_with(Default::default);
        if status.applied_spec.is_none() {
            status.applied_spec = Some(NrqlAlertConditionSpec::default());
        }
    }
}
