//! Admission webhooks for the NRQL alert condition kinds.
//!
//! Per incoming request the server composes:
//! - `defaulting`: mutating hook, initializes `status.applied_spec`
//! - `pipeline`: validating hook orchestration per lifecycle event
//! - `credentials`: API key resolution (inline field or referenced secret)
//! - `policy_check`: existence check of the referenced alert policy

pub mod credentials;
pub mod defaulting;
pub mod pipeline;
pub mod policy_check;
mod server;

pub use credentials::{KubeSecretStore, SecretStore};
pub use pipeline::{AdmissionError, AdmissionEvent, WebhookDeps};
pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
