// tests/alerts_flow.rs
//
// End-to-end alert lifecycle over the Router: a severe hour of traffic
// triggers the on-demand sweep, the resulting alert is deduplicated on a
// second sweep, then goes through its single reviewer transition.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Request as HttpRequest, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _;

use rukn_monitor::classifier::{Classifier, Prediction};
use rukn_monitor::model::{Channel, Emotion, Request, RequestLabels, Urgency};
use rukn_monitor::notify::NoopNotifier;
use rukn_monitor::{router, AppState, MemoryStore, RequestStore};

const BODY_LIMIT: usize = 1024 * 1024;

struct UnusedClassifier;

#[async_trait]
impl Classifier for UnusedClassifier {
    async fn classify(&self, _text: &str) -> anyhow::Result<Prediction> {
        anyhow::bail!("classifier must not be called in this test")
    }
}

fn test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        store: store.clone(),
        classifier: Arc::new(UnusedClassifier),
        notifier: Arc::new(NoopNotifier),
    };
    (router(state), store)
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn post(uri: &str, payload: &Json) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn patch(uri: &str, payload: &Json) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method("PATCH")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

/// Fill the current hour for one region with severe traffic: every
/// request fearful, high urgency, crisis topic.
async fn seed_severe_hour(store: &MemoryStore, region: &str, n: usize) {
    let now = chrono::Utc::now();
    for _ in 0..n {
        let placeholder = Request::placeholder(Channel::Call, region, "حالة حرجة", now);
        let inserted = store.insert_request(placeholder).await.unwrap();
        store
            .update_request_labels(
                inserted.id,
                RequestLabels {
                    emotion: Some(Emotion::Fear),
                    topic: Some("Crisis".to_string()),
                    urgency: Some(Urgency::High),
                    confidence: Some(0.9),
                    is_flagged: true,
                },
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn severe_hour_produces_one_deduplicated_alert() {
    let (app, store) = test_app();
    seed_severe_hour(&store, "riyadh", 12).await;

    let resp = app
        .clone()
        .oneshot(post("/generate-alerts", &json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["alerts_created"], json!(1));

    let alert = &body["alerts"][0];
    assert_eq!(alert["region"], json!("riyadh"));
    assert_eq!(alert["status"], json!("pending"));
    assert_eq!(alert["confidence"], json!(0.85));
    // All-severe traffic hits the absolute-EWI rule first.
    let z = alert["evidence"]["z_scores"]["high_ewi"].as_f64().unwrap();
    assert!((z - 3.97).abs() < 1e-9);
    assert!(alert["recommendations"].as_array().unwrap().len() >= 2);

    // Second sweep in the same hour: same draft, skipped by the store.
    let resp = app
        .clone()
        .oneshot(post("/generate-alerts", &json!({})))
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["alerts_created"], json!(0));

    // Still exactly one pending alert on the list endpoint.
    let resp = app
        .oneshot(
            HttpRequest::builder()
                .method("GET")
                .uri("/alerts?status=pending")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed = json_body(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn thin_hour_is_skipped_by_the_sweep() {
    let (app, store) = test_app();
    // Below the minimum sample: even all-severe traffic stays silent.
    seed_severe_hour(&store, "tabuk", 4).await;

    let resp = app
        .oneshot(post("/generate-alerts", &json!({})))
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["alerts_created"], json!(0));
}

#[tokio::test]
async fn alert_review_is_one_shot_over_http() {
    let (app, store) = test_app();
    seed_severe_hour(&store, "jazan", 10).await;

    let resp = app
        .clone()
        .oneshot(post("/generate-alerts", &json!({})))
        .await
        .unwrap();
    let body = json_body(resp).await;
    let id = body["alerts"][0]["id"].as_str().unwrap().to_string();

    let payload = json!({
        "action": "approve",
        "reviewed_by": "dr.huda",
        "notes": "تم التصعيد لفريق الطوارئ",
    });
    let resp = app
        .clone()
        .oneshot(patch(&format!("/alerts/{id}"), &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["action"], json!("approve"));
    assert_eq!(body["data"]["status"], json!("approved"));
    assert_eq!(body["data"]["reviewed_by"], json!("dr.huda"));

    // The transition is terminal; a second review is rejected.
    let resp = app
        .oneshot(patch(&format!("/alerts/{id}"), &json!({ "action": "reject" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
