//! HTTP implementation of the alerts client against the New Relic REST API.
//!
//! Both lookups are idempotent reads, so they carry a bounded request
//! timeout and one retry on server errors and transport failures. A 404 is
//! mapped to [`AlertsError::PolicyNotFound`] so callers never have to match
//! on response text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::client::{AlertPolicy, AlertsClient, AlertsClientFactory, AlertsError};

/// Per-request timeout for alerts API reads.
pub const API_TIMEOUT: Duration = Duration::from_secs(10);
/// Total attempts per lookup (first try plus retries).
const API_ATTEMPTS: u32 = 2;
/// Pause between attempts.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Base API URL for a New Relic region.
fn region_base_url(region: &str) -> Result<&'static str, AlertsError> {
    match region.to_ascii_uppercase().as_str() {
        "US" => Ok("https://api.newrelic.com"),
        "EU" => Ok("https://api.eu.newrelic.com"),
        other => Err(AlertsError::InvalidConfig(format!(
            "unknown region {other:?}, expected \"US\" or \"EU\""
        ))),
    }
}

/// Factory producing [`HttpAlertsClient`] instances.
#[derive(Clone, Debug, Default)]
pub struct HttpAlertsClientFactory {
    /// Override for the region-derived base URL, used in tests.
    pub base_url: Option<String>,
}

impl AlertsClientFactory for HttpAlertsClientFactory {
    fn create(&self, api_key: &str, region: &str) -> Result<Box<dyn AlertsClient>, AlertsError> {
        if api_key.is_empty() {
            return Err(AlertsError::InvalidConfig(
                "API key must not be empty".to_string(),
            ));
        }
        let base_url = match &self.base_url {
            Some(url) => url.clone(),
            None => region_base_url(region)?.to_string(),
        };
        let http = reqwest::Client::builder().timeout(API_TIMEOUT).build()?;
        Ok(Box::new(HttpAlertsClient {
            http,
            base_url,
            api_key: api_key.to_string(),
        }))
    }
}

/// Alerts client talking to the New Relic v2 REST API.
pub struct HttpAlertsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct PolicyEnvelope {
    policy: AlertPolicy,
}

impl HttpAlertsClient {
    async fn fetch_policy(&self, url: &str, policy_id: &str) -> Result<AlertPolicy, AlertsError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = match self
                .http
                .get(url)
                .header("X-Api-Key", &self.api_key)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) if attempt < API_ATTEMPTS && (e.is_timeout() || e.is_connect()) => {
                    debug!(attempt, error = %e, "alerts API request failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(AlertsError::PolicyNotFound {
                    policy_id: policy_id.to_string(),
                });
            }
            if status.is_server_error() && attempt < API_ATTEMPTS {
                debug!(attempt, %status, "alerts API returned a server error, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(AlertsError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let envelope: PolicyEnvelope = response.json().await?;
            return Ok(envelope.policy);
        }
    }
}

#[async_trait]
impl AlertsClient for HttpAlertsClient {
    async fn query_policy_by_account(
        &self,
        account_id: i32,
        policy_id: &str,
    ) -> Result<AlertPolicy, AlertsError> {
        let url = format!(
            "{}/v2/accounts/{}/alerts_policies/{}.json",
            self.base_url, account_id, policy_id
        );
        self.fetch_policy(&url, policy_id).await
    }

    async fn get_policy(&self, policy_id: i64) -> Result<AlertPolicy, AlertsError> {
        let url = format!("{}/v2/alerts_policies/{}.json", self.base_url, policy_id);
        self.fetch_policy(&url, &policy_id.to_string()).await
    }
}
