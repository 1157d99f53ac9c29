//! Alerts API client abstraction.
//!
//! Admission validation only ever reads a single policy, so the client
//! surface is two lookup methods behind a dyn-safe trait. A factory trait
//! stands in for the (api_key, region) scoped constructor so the webhook
//! dependencies can be swapped for scripted fakes in tests.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// An alert policy as returned by the New Relic alerts API.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AlertPolicy {
    /// Numeric policy id.
    pub id: i64,
    /// Policy name.
    #[serde(default)]
    pub name: String,
    /// How incidents are rolled up under this policy.
    #[serde(default)]
    pub incident_preference: Option<String>,
}

/// Errors from the alerts API.
#[derive(Error, Debug)]
pub enum AlertsError {
    /// The requested policy does not exist. Modeled as its own variant so
    /// callers can match on it instead of inspecting error text.
    #[error("no alert policy found for id {policy_id}")]
    PolicyNotFound { policy_id: String },

    /// The client could not be constructed from the given key and region.
    #[error("invalid alerts client configuration: {0}")]
    InvalidConfig(String),

    /// The API answered with a non-success status.
    #[error("alerts API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced an API answer.
    #[error("alerts API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Read access to alert policies, scoped to one (api_key, region) pair.
#[async_trait]
pub trait AlertsClient: Send + Sync {
    /// Look up a policy within an account.
    async fn query_policy_by_account(
        &self,
        account_id: i32,
        policy_id: &str,
    ) -> Result<AlertPolicy, AlertsError>;

    /// Look up a policy by numeric id alone.
    async fn get_policy(&self, policy_id: i64) -> Result<AlertPolicy, AlertsError>;
}

impl std::fmt::Debug for dyn AlertsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AlertsClient")
    }
}

/// Constructs an [`AlertsClient`] for an (api_key, region) pair.
pub trait AlertsClientFactory: Send + Sync {
    fn create(&self, api_key: &str, region: &str) -> Result<Box<dyn AlertsClient>, AlertsError>;
}

/// Redacted form of an API key safe for log output.
pub fn partial_api_key(api_key: &str) -> String {
    let visible: String = api_key.chars().take(8).collect();
    if api_key.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}***", visible)
    }
}
