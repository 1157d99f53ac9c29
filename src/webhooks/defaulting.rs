//! Defaulting for the mutating admission hook.
//!
//! The only defaulted field is `status.applied_spec`: when unset it is
//! initialized to an empty spec so the reconciler always has a snapshot to
//! diff against. An existing value is never overwritten, so applying the
//! defaulting twice is a no-op.

use crate::crd::AlertCondition;

/// Compute the JSON patch that applies defaulting to `resource`.
///
/// Returns an empty patch when nothing needs to change.
pub fn applied_spec_patch<K: AlertCondition>(
    resource: &K,
) -> Result<json_patch::Patch, serde_json::Error> {
    let before = serde_json::to_value(resource)?;
    let mut defaulted = resource.clone();
    defaulted.default_applied_spec();
    let after = serde_json::to_value(&defaulted)?;
    Ok(json_patch::diff(&before, &after))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::crd::{
        AlertsNrqlCondition, AlertsNrqlConditionSpec, NrqlAlertCondition, NrqlAlertConditionSpec,
        NrqlAlertConditionStatus,
    };

    #[test]
    fn test_patch_initializes_applied_spec() {
        let condition = AlertsNrqlCondition::new(
            "test",
            AlertsNrqlConditionSpec {
                region: "US".into(),
                existing_policy_id: "42".into(),
                ..Default::default()
            },
        );
        let patch = applied_spec_patch(&condition).unwrap();
        assert!(!patch.0.is_empty());

        // Applying the patch yields a resource the defaulting leaves alone.
        let mut value = serde_json::to_value(&condition).unwrap();
        json_patch::patch(&mut value, &patch).unwrap();
        let patched: AlertsNrqlCondition = serde_json::from_value(value).unwrap();
        assert!(
            patched
                .status
                .as_ref()
                .and_then(|s| s.applied_spec.as_ref())
                .is_some()
        );
        assert!(applied_spec_patch(&patched).unwrap().0.is_empty());
    }

    #[test]
    fn test_patch_is_empty_when_applied_spec_present() {
        let mut condition = NrqlAlertCondition::new(
            "test",
            NrqlAlertConditionSpec {
                existing_policy_id: 42,
                ..Default::default()
            },
        );
        condition.status = Some(NrqlAlertConditionStatus {
            applied_spec: Some(NrqlAlertConditionSpec {
                existing_policy_id: 42,
                ..Default::default()
            }),
            condition_id: Some(7),
        });

        let patch = applied_spec_patch(&condition).unwrap();
        assert!(patch.0.is_empty());
    }
}
