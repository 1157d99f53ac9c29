//! New Relic alerts API client.
//!
//! The admission webhooks only need to confirm that a referenced alert
//! policy exists, so this module exposes a narrow read-only client:
//!
//! - `client`: the `AlertsClient` trait, policy type, and error taxonomy
//! - `http`: reqwest-backed implementation with timeout and bounded retry

mod client;
mod http;

pub use client::{AlertPolicy, AlertsClient, AlertsClientFactory, AlertsError, partial_api_key};
pub use http::{API_TIMEOUT, HttpAlertsClientFactory};
