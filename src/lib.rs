//! nr-alerts-operator library crate
//!
//! Admission webhooks for the NRQL alert condition CRDs: defaulting of the
//! applied-spec status snapshot and admission-time validation of the spec
//! against the New Relic alerts API. Reconciliation of admitted conditions
//! is handled by a separate controller and is out of scope here.

pub mod alerts;
pub mod crd;
pub mod health;
pub mod webhooks;

pub use health::HealthState;
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookDeps, WebhookError,
    run_webhook_server,
};
