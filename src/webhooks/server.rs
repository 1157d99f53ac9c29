//! Admission webhook server.
//!
//! Serves the mutating and validating hooks for both condition kinds, one
//! path per hook. The webhook configurations (out of repo scope) register
//! these paths with `failurePolicy=fail` and `sideEffects=None`, so an
//! unanswered or errored request blocks the triggering cluster operation.
//!
//! To enable the webhooks:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create the Mutating/ValidatingWebhookConfiguration objects
//! 3. Mount the TLS certificate secret to the operator pod at /etc/webhook/certs/

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use kube::Resource;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::defaulting;
use super::pipeline::{self, AdmissionEvent, WebhookDeps};
use crate::crd::{AlertCondition, AlertsNrqlCondition, NrqlAlertCondition};
use crate::health::HealthState;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub deps: WebhookDeps,
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(deps: WebhookDeps, health: Option<Arc<HealthState>>) -> Self {
        Self { deps, health }
    }

    fn record(&self, kind: &str, allowed: bool) {
        if let Some(health) = &self.health {
            health.record_admission(kind, allowed);
        }
    }
}

/// Create a denial response with reason embedded in message.
/// kube-rs deny() only sets status.message, so we format as "[reason] message"
fn deny_with_reason<T: Resource<DynamicType = ()>>(
    request: &AdmissionRequest<T>,
    message: &str,
    reason: &str,
) -> AdmissionReview<DynamicObject> {
    let full_message = format!("[{}] {}", reason, message);
    AdmissionResponse::from(request)
        .deny(full_message)
        .into_review()
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(
            "/mutate-alertsnrqlcondition",
            post(mutate::<AlertsNrqlCondition>),
        )
        .route(
            "/validate-alertsnrqlcondition",
            post(validate::<AlertsNrqlCondition>),
        )
        .route(
            "/mutate-nrqlalertcondition",
            post(mutate::<NrqlAlertCondition>),
        )
        .route(
            "/validate-nrqlalertcondition",
            post(validate::<NrqlAlertCondition>),
        )
        .with_state(state)
}

/// Mutating hook: initialize `status.applied_spec` when unset.
async fn mutate<K: AlertCondition>(
    State(_state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<K>>,
) -> impl IntoResponse {
    let request: AdmissionRequest<K> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let uid = request.uid.clone();
    let kind = K::kind(&());
    debug!(
        uid = %uid,
        kind = %kind,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing mutating admission request"
    );

    let Some(resource) = request.object.clone() else {
        // Nothing to default; the validating hook handles missing objects.
        return (
            StatusCode::OK,
            Json(AdmissionResponse::from(&request).into_review()),
        );
    };

    let patch = match defaulting::applied_spec_patch(&resource) {
        Ok(patch) => patch,
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to compute defaulting patch");
            return (
                StatusCode::OK,
                Json(AdmissionResponse::invalid(e.to_string()).into_review()),
            );
        }
    };

    if patch.0.is_empty() {
        debug!(uid = %uid, "Applied spec already set, nothing to default");
        return (
            StatusCode::OK,
            Json(AdmissionResponse::from(&request).into_review()),
        );
    }

    info!(uid = %uid, kind = %kind, "Defaulting null applied spec to empty spec");
    match AdmissionResponse::from(&request).with_patch(patch) {
        Ok(response) => (StatusCode::OK, Json(response.into_review())),
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to serialize defaulting patch");
            (
                StatusCode::OK,
                Json(AdmissionResponse::invalid(e.to_string()).into_review()),
            )
        }
    }
}

/// Validating hook: run the per-kind validation pipeline.
async fn validate<K: AlertCondition>(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<K>>,
) -> impl IntoResponse {
    let request: AdmissionRequest<K> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let uid = request.uid.clone();
    let kind = K::kind(&());
    debug!(
        uid = %uid,
        kind = %kind,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing validating admission request"
    );

    let event = match request.operation {
        Operation::Create => AdmissionEvent::Create,
        Operation::Update => AdmissionEvent::Update,
        Operation::Delete => AdmissionEvent::Delete,
        Operation::Connect => {
            return (
                StatusCode::OK,
                Json(AdmissionResponse::from(&request).into_review()),
            );
        }
    };

    // DELETE requests carry the resource in old_object.
    let resource = match request.object.clone().or_else(|| request.old_object.clone()) {
        Some(resource) => resource,
        None => {
            error!(uid = %uid, "Missing object in request");
            return (
                StatusCode::OK,
                Json(deny_with_reason(
                    &request,
                    "Missing object in request",
                    "InvalidRequest",
                )),
            );
        }
    };

    match pipeline::validate(&state.deps, &resource, event).await {
        Ok(()) => {
            info!(uid = %uid, kind = %kind, ?event, "Admission request allowed");
            state.record(&kind, true);
            (
                StatusCode::OK,
                Json(AdmissionResponse::from(&request).into_review()),
            )
        }
        Err(err) => {
            warn!(
                uid = %uid,
                kind = %kind,
                ?event,
                reason = err.reason(),
                message = %err,
                "Admission request denied"
            );
            state.record(&kind, false);
            (
                StatusCode::OK,
                Json(deny_with_reason(&request, &err.to_string(), err.reason())),
            )
        }
    }
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:9443 and serves the mutate/validate endpoints for both
/// condition kinds. TLS certificates are loaded from the paths specified.
pub async fn run_webhook_server(
    deps: WebhookDeps,
    health: Option<Arc<HealthState>>,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let state = Arc::new(WebhookState::new(deps, health));
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!(port = WEBHOOK_PORT, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
