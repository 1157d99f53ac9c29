//! Shared types and the per-kind abstraction for NRQL alert condition CRDs.
//!
//! Both condition kinds run through one validation pipeline; the differences
//! between them (how the policy id is represented, whether the policy lookup
//! is account-scoped, which lifecycle events run checks) are captured here as
//! data via [`KindRules`] and the [`AlertCondition`] trait instead of two
//! diverging copies of the pipeline.

use std::fmt;

use kube::Resource;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Reference to a key inside a Kubernetes secret holding a New Relic API key.
///
/// All three fields must be populated for the reference to be usable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ApiKeySecretRef {
    /// Name of the secret.
    #[serde(default)]
    pub name: String,
    /// Namespace the secret lives in.
    #[serde(default)]
    pub namespace: String,
    /// Key within the secret data holding the API key.
    #[serde(default)]
    pub key_name: String,
}

impl ApiKeySecretRef {
    /// A reference is usable only when every field is set.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.namespace.is_empty() && !self.key_name.is_empty()
    }
}

/// NRQL query backing an alert condition.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct NrqlQuery {
    /// The NRQL query string.
    #[serde(default)]
    pub query: String,
    /// Evaluation window offset, e.g. "5".
    #[serde(default)]
    pub since_value: String,
}

/// A single threshold term of an alert condition.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct AlertConditionTerm {
    /// Comparison operator ("above", "below", "equal").
    #[serde(default)]
    pub operator: String,
    /// Term priority ("critical" or "warning").
    #[serde(default)]
    pub priority: String,
    /// Threshold value the query result is compared against.
    #[serde(default)]
    pub threshold: String,
    /// Seconds the threshold must be breached before opening a violation.
    #[serde(default)]
    pub threshold_duration: i32,
    /// Occurrence mode ("all" or "at_least_once").
    #[serde(default)]
    pub threshold_occurrences: String,
}

/// Identifier of a pre-existing alert policy.
///
/// One kind stores the id as a string, the other as a number. The asymmetry
/// comes from the CRD wire formats and is deliberate: "missing" means empty
/// string for the former and zero for the latter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyId {
    Text(String),
    Numeric(i64),
}

impl PolicyId {
    /// Whether the id counts as unset for the required-fields check.
    pub fn is_missing(&self) -> bool {
        match self {
            PolicyId::Text(id) => id.is_empty(),
            PolicyId::Numeric(id) => *id == 0,
        }
    }

    /// Numeric value, when the id is (or parses as) a number.
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            PolicyId::Text(id) => id.parse().ok(),
            PolicyId::Numeric(id) => Some(*id),
        }
    }

    /// Compare against the id returned by the alerts API.
    pub fn matches(&self, returned: i64) -> bool {
        self.as_numeric() == Some(returned)
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyId::Text(id) => f.write_str(id),
            PolicyId::Numeric(id) => write!(f, "{}", id),
        }
    }
}

/// Per-kind validation rules.
///
/// The two kinds intentionally diverge; keeping the divergence as explicit
/// flags makes it visible in one place rather than scattered across two
/// near-identical pipelines.
#[derive(Clone, Copy, Debug)]
pub struct KindRules {
    /// Look the policy up scoped by account id instead of by id alone.
    pub account_scoped_lookup: bool,
    /// Compare the returned policy id against the requested one.
    pub verify_policy_match: bool,
    /// Run the full create checks on update as well.
    pub update_runs_checks: bool,
    /// Verify the policy on delete (with not-found tolerance).
    pub delete_verifies_policy: bool,
}

/// Borrowed view of the spec fields admission validation reads.
pub struct ConditionFields<'a> {
    pub api_key: &'a str,
    pub api_key_secret: &'a ApiKeySecretRef,
    pub region: &'a str,
    pub account_id: i32,
    pub policy_id: PolicyId,
}

/// Implemented by both condition CRDs so the webhook handlers and the
/// validation pipeline can stay generic.
pub trait AlertCondition:
    Resource<DynamicType = ()>
    + Clone
    + Serialize
    + DeserializeOwned
    + std::fmt::Debug
    + Send
    + Sync
    + 'static
{
    /// Validation rules for this kind.
    fn rules() -> KindRules;

    /// The fields validation operates on.
    fn fields(&self) -> ConditionFields<'_>;

    /// Initialize `status.applied_spec` to an empty spec when unset.
    /// Never overwrites an existing value.
    fn default_applied_spec(&mut self);
}
