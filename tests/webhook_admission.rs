//! End-to-end admission tests driving the webhook router over HTTP.
//!
//! These run without a Kubernetes cluster: the secret store and alerts
//! client factory are swapped for in-memory fakes, and requests are sent
//! through the axum router with `tower::ServiceExt::oneshot`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::core::ErrorResponse;
use serde_json::{Value, json};
use tower::ServiceExt;

use nr_alerts_operator::alerts::{AlertPolicy, AlertsClient, AlertsClientFactory, AlertsError};
use nr_alerts_operator::crd::{
    AlertsNrqlCondition, AlertsNrqlConditionSpec, ApiKeySecretRef, NrqlAlertCondition,
    NrqlAlertConditionSpec,
};
use nr_alerts_operator::webhooks::{
    SecretStore, WebhookDeps, WebhookState, create_webhook_router,
};

#[derive(Clone)]
enum Reply {
    Found(i64),
    NotFound,
}

struct FakeAlerts {
    reply: Reply,
}

struct FakeAlertsClient {
    reply: Reply,
}

impl FakeAlertsClient {
    fn answer(&self, policy_id: String) -> Result<AlertPolicy, AlertsError> {
        match &self.reply {
            Reply::Found(id) => Ok(AlertPolicy {
                id: *id,
                name: "production".into(),
                incident_preference: None,
            }),
            Reply::NotFound => Err(AlertsError::PolicyNotFound { policy_id }),
        }
    }
}

#[async_trait]
impl AlertsClient for FakeAlertsClient {
    async fn query_policy_by_account(
        &self,
        _account_id: i32,
        policy_id: &str,
    ) -> Result<AlertPolicy, AlertsError> {
        self.answer(policy_id.to_string())
    }

    async fn get_policy(&self, policy_id: i64) -> Result<AlertPolicy, AlertsError> {
        self.answer(policy_id.to_string())
    }
}

impl AlertsClientFactory for FakeAlerts {
    fn create(&self, _api_key: &str, _region: &str) -> Result<Box<dyn AlertsClient>, AlertsError> {
        Ok(Box::new(FakeAlertsClient {
            reply: self.reply.clone(),
        }))
    }
}

struct MapSecretStore {
    secrets: BTreeMap<(String, String), Secret>,
}

#[async_trait]
impl SecretStore for MapSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error> {
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                kube::Error::Api(ErrorResponse {
                    status: "Failure".to_string(),
                    message: format!("secrets \"{}\" not found", name),
                    reason: "NotFound".to_string(),
                    code: 404,
                })
            })
    }
}

fn router(reply: Reply) -> Router {
    let mut data = BTreeMap::new();
    data.insert(
        "api_key".to_string(),
        ByteString(b"NRAK-FROM-SECRET".to_vec()),
    );
    let mut secrets = BTreeMap::new();
    secrets.insert(
        ("default".to_string(), "newrelic".to_string()),
        Secret {
            data: Some(data),
            ..Default::default()
        },
    );
    let deps = WebhookDeps::new(
        Arc::new(MapSecretStore { secrets }),
        Arc::new(FakeAlerts { reply }),
    );
    create_webhook_router(Arc::new(WebhookState::new(deps, None)))
}

fn admission_review(
    kind: &str,
    plural: &str,
    operation: &str,
    object: Option<Value>,
    old_object: Option<Value>,
) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "nr.k8s.newrelic.com", "version": "v1", "kind": kind},
            "resource": {"group": "nr.k8s.newrelic.com", "version": "v1", "resource": plural},
            "name": "test",
            "namespace": "default",
            "operation": operation,
            "userInfo": {},
            "object": object,
            "oldObject": old_object,
            "dryRun": false,
        },
    })
}

async fn post(app: Router, path: &str, review: Value) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&review).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn valid_kind_b() -> NrqlAlertCondition {
    NrqlAlertCondition::new(
        "test",
        NrqlAlertConditionSpec {
            api_key_secret: ApiKeySecretRef {
                name: "newrelic".into(),
                namespace: "default".into(),
                key_name: "api_key".into(),
            },
            region: "US".into(),
            existing_policy_id: 42,
            ..Default::default()
        },
    )
}

fn valid_kind_a() -> AlertsNrqlCondition {
    AlertsNrqlCondition::new(
        "test",
        AlertsNrqlConditionSpec {
            api_key: "NRAK-INLINE".into(),
            account_id: 1234567,
            region: "US".into(),
            existing_policy_id: "42".into(),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn validate_create_allows_valid_condition() {
    let app = router(Reply::Found(42));
    let object = serde_json::to_value(&valid_kind_b()).unwrap();
    let review = admission_review(
        "NrqlAlertCondition",
        "nrqlalertconditions",
        "CREATE",
        Some(object),
        None,
    );

    let body = post(app, "/validate-nrqlalertcondition", review).await;
    assert_eq!(body["response"]["allowed"], json!(true));
}

#[tokio::test]
async fn validate_create_denies_missing_required_fields() {
    let app = router(Reply::Found(42));
    let condition = NrqlAlertCondition::new(
        "test",
        NrqlAlertConditionSpec {
            api_key: "NRAK-INLINE".into(),
            ..Default::default()
        },
    );
    let object = serde_json::to_value(&condition).unwrap();
    let review = admission_review(
        "NrqlAlertCondition",
        "nrqlalertconditions",
        "CREATE",
        Some(object),
        None,
    );

    let body = post(app, "/validate-nrqlalertcondition", review).await;
    assert_eq!(body["response"]["allowed"], json!(false));
    let message = body["response"]["status"]["message"].as_str().unwrap();
    assert!(message.contains("[InvalidConfiguration]"));
    assert!(message.contains("region and existing_policy_id must be set"));
}

#[tokio::test]
async fn validate_update_always_allows_kind_a() {
    // Kind A runs no checks on update, even for an empty spec.
    let app = router(Reply::NotFound);
    let condition = AlertsNrqlCondition::new("test", AlertsNrqlConditionSpec::default());
    let object = serde_json::to_value(&condition).unwrap();
    let review = admission_review(
        "AlertsNrqlCondition",
        "alertsnrqlconditions",
        "UPDATE",
        Some(object.clone()),
        Some(object),
    );

    let body = post(app, "/validate-alertsnrqlcondition", review).await;
    assert_eq!(body["response"]["allowed"], json!(true));
}

#[tokio::test]
async fn validate_delete_tolerates_missing_policy_for_kind_b() {
    // DELETE carries the resource in oldObject only.
    let app = router(Reply::NotFound);
    let object = serde_json::to_value(&valid_kind_b()).unwrap();
    let review = admission_review(
        "NrqlAlertCondition",
        "nrqlalertconditions",
        "DELETE",
        None,
        Some(object),
    );

    let body = post(app, "/validate-nrqlalertcondition", review).await;
    assert_eq!(body["response"]["allowed"], json!(true));
}

#[tokio::test]
async fn validate_create_allows_kind_a_with_account_scoped_lookup() {
    let app = router(Reply::Found(42));
    let object = serde_json::to_value(&valid_kind_a()).unwrap();
    let review = admission_review(
        "AlertsNrqlCondition",
        "alertsnrqlconditions",
        "CREATE",
        Some(object),
        None,
    );

    let body = post(app, "/validate-alertsnrqlcondition", review).await;
    assert_eq!(body["response"]["allowed"], json!(true));
}

#[tokio::test]
async fn mutate_defaults_null_applied_spec() {
    let app = router(Reply::Found(42));
    let object = serde_json::to_value(&valid_kind_b()).unwrap();
    let review = admission_review(
        "NrqlAlertCondition",
        "nrqlalertconditions",
        "CREATE",
        Some(object),
        None,
    );

    let body = post(app, "/mutate-nrqlalertcondition", review).await;
    assert_eq!(body["response"]["allowed"], json!(true));
    assert_eq!(body["response"]["patchType"], json!("JSONPatch"));
    assert!(!body["response"]["patch"].is_null());
}

#[tokio::test]
async fn mutate_leaves_initialized_status_alone() {
    let app = router(Reply::Found(42));
    let mut condition = valid_kind_b();
    condition.status = Some(nr_alerts_operator::crd::NrqlAlertConditionStatus {
        applied_spec: Some(condition.spec.clone()),
        condition_id: None,
    });
    let object = serde_json::to_value(&condition).unwrap();
    let review = admission_review(
        "NrqlAlertCondition",
        "nrqlalertconditions",
        "UPDATE",
        Some(object),
        None,
    );

    let body = post(app, "/mutate-nrqlalertcondition", review).await;
    assert_eq!(body["response"]["allowed"], json!(true));
    assert!(body["response"]["patch"].is_null());
}

#[tokio::test]
async fn invalid_review_body_is_rejected() {
    let app = router(Reply::Found(42));
    // A review without a request payload cannot be converted.
    let review = json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
    });
    let request = Request::builder()
        .method("POST")
        .uri("/validate-nrqlalertcondition")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&review).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
