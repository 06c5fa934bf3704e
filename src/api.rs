//! HTTP surface of the monitoring service.
//!
//! Thin handlers: parse/validate, call the store or the engines, shape
//! the view models the dashboard expects. All computation lives in
//! `aggregate` / `anomaly`; all persistence behind `RequestStore`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::aggregate::{compute_aggregate, group_by_region, RegionAggregate, ALL_REGIONS};
use crate::anomaly;
use crate::classifier::Classifier;
use crate::model::{
    should_flag, Alert, AlertAction, AlertStatus, Channel, Emotion, EmotionCategory, Request,
    RequestLabels, RequestStatus, ReviewUpdate, Urgency,
};
use crate::notify::ApprovalNotifier;
use crate::regions;
use crate::store::{RequestFilter, RequestStore, StoreError};
use crate::topic;
use crate::window::Window;

/// Flagged-requests responses are capped at this many rows.
const FLAGGED_LIMIT: usize = 50;
const DEFAULT_ALERT_LIMIT: usize = 20;
const TEXT_PREVIEW_CHARS: usize = 150;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RequestStore>,
    pub classifier: Arc<dyn Classifier>,
    pub notifier: Arc<dyn ApprovalNotifier>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/aggregates", get(aggregates))
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}", get(get_alert).patch(review_alert))
        .route(
            "/flagged-requests",
            get(flagged_requests).patch(review_flagged),
        )
        .route("/generate-alerts", post(generate_alerts))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// API error kinds, mapped onto HTTP statuses. Upstream messages are
/// passed through in the body: this is an internal ops tool and the
/// diagnostics are worth more than opacity.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(format!("record not found: {id}")),
            StoreError::InvalidTransition(msg) => Self::Validation(msg),
            StoreError::Backend(msg) => Self::Upstream(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// POST /analyze — ingestion
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AnalyzeBody {
    text: Option<String>,
    channel: Option<String>,
    region: Option<String>,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<Value>, ApiError> {
    let text = body
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("text is required".into()))?
        .to_string();
    let channel = body
        .channel
        .as_deref()
        .and_then(Channel::parse)
        .ok_or_else(|| ApiError::Validation("channel must be one of: call, chat, survey".into()))?;
    let region = body
        .region
        .as_deref()
        .and_then(regions::by_code)
        .ok_or_else(|| ApiError::Validation("unknown region code".into()))?;

    // Insert-then-update: the row exists before the classifier is called,
    // so a slow or failing classifier never loses the ingested request.
    let now = Utc::now();
    let placeholder = Request::placeholder(channel, region.code, text.clone(), now);
    let inserted = state.store.insert_request(placeholder).await?;

    let prediction = state
        .classifier
        .classify(&text)
        .await
        .map_err(|e| ApiError::Upstream(format!("classifier failure: {e}")))?;

    let emotion = Emotion::from_model_label(&prediction.emotion);
    let urgency = Urgency::parse(&prediction.urgency);
    let topic = topic::predict_topic(&text);
    let labels = RequestLabels {
        emotion: Some(emotion),
        topic: Some(topic.to_string()),
        urgency,
        confidence: Some(prediction.confidence),
        is_flagged: should_flag(urgency, &prediction.reasons, Some(emotion)),
    };
    let updated = state.store.update_request_labels(inserted.id, labels).await?;

    Ok(Json(json!({
        "success": true,
        "request_id": updated.id,
        "analysis": {
            "emotion": emotion,
            "urgency": urgency,
            "topic": topic,
            "confidence": prediction.confidence,
            "is_flagged": updated.is_flagged,
            "raw": prediction,
        },
    })))
}

// ---------------------------------------------------------------------------
// GET /aggregates
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AggregatesQuery {
    region: Option<String>,
    window: Option<String>,
    channels: Option<String>,
}

async fn aggregates(
    State(state): State<AppState>,
    Query(q): Query<AggregatesQuery>,
) -> Result<Response, ApiError> {
    let window = match q.window.as_deref() {
        None => Window::Today,
        Some(label) => Window::parse(label)
            .ok_or_else(|| ApiError::Validation(format!("unknown window label: {label}")))?,
    };
    let channels = match q.channels.as_deref() {
        None | Some("") => None,
        Some(csv) => {
            let mut parsed = Vec::new();
            for part in csv.split(',') {
                let c = Channel::parse(part)
                    .ok_or_else(|| ApiError::Validation(format!("unknown channel: {part}")))?;
                parsed.push(c);
            }
            Some(parsed)
        }
    };

    let now = Utc::now();
    let filter = RequestFilter {
        region: q.region.clone(),
        since: Some(window.start(now)),
        channels,
        ..Default::default()
    };
    let requests = state.store.query_requests(&filter).await?;

    match q.region.as_deref() {
        // No region: one aggregate per region present in the filtered set.
        None => {
            let out: Vec<RegionAggregate> = group_by_region(requests)
                .into_iter()
                .map(|(code, group)| compute_aggregate(Some(&code), &group, window))
                .collect();
            Ok(Json(out).into_response())
        }
        Some(ALL_REGIONS) => Ok(Json(compute_aggregate(None, &requests, window)).into_response()),
        Some(code) => Ok(Json(compute_aggregate(Some(code), &requests, window)).into_response()),
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AlertEvidence {
    window: Window,
    z_scores: Value,
    top_phrases: Value,
    flagged_count: u64,
}

#[derive(Serialize)]
struct AlertView {
    id: Uuid,
    ts: DateTime<Utc>,
    region: String,
    summary: String,
    evidence: AlertEvidence,
    recommendations: Value,
    status: AlertStatus,
    confidence: f64,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    review_notes: Option<String>,
}

fn alert_view(alert: &Alert) -> AlertView {
    let z_scores = match alert.z_score {
        Some(z) => json!({ alert.alert_type.as_str(): z }),
        None => json!({}),
    };
    let recommendations = alert
        .metadata
        .get("recommendations")
        .cloned()
        .unwrap_or_else(|| {
            json!([{
                "type": "staffing",
                "text": format!("Review staffing levels in {}", alert.region),
            }])
        });
    AlertView {
        id: alert.id,
        ts: alert.created_at,
        region: alert.region.clone(),
        summary: alert.summary.clone(),
        evidence: AlertEvidence {
            window: alert.time_window,
            z_scores,
            top_phrases: alert
                .metadata
                .get("top_phrases")
                .cloned()
                .unwrap_or_else(|| json!([])),
            flagged_count: alert
                .metadata
                .get("flagged_count")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        },
        recommendations,
        status: alert.status,
        confidence: alert.confidence,
        reviewed_by: alert.reviewed_by.clone(),
        reviewed_at: alert.reviewed_at,
        review_notes: alert.review_notes.clone(),
    }
}

#[derive(Deserialize)]
struct AlertsQuery {
    status: Option<String>,
    region: Option<String>,
    limit: Option<usize>,
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(q): Query<AlertsQuery>,
) -> Result<Json<Vec<AlertView>>, ApiError> {
    let status = match q.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(AlertStatus::parse(s).ok_or_else(|| {
            ApiError::Validation("status must be one of: pending, approved, rejected".into())
        })?),
    };
    let alerts = state
        .store
        .query_alerts(
            status,
            q.region.as_deref(),
            q.limit.unwrap_or(DEFAULT_ALERT_LIMIT),
        )
        .await?;
    Ok(Json(alerts.iter().map(alert_view).collect()))
}

async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AlertView>, ApiError> {
    let alert = state.store.get_alert(id).await?;
    Ok(Json(alert_view(&alert)))
}

#[derive(Deserialize)]
struct AlertReviewBody {
    action: Option<String>,
    reviewed_by: Option<String>,
    notes: Option<String>,
}

async fn review_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AlertReviewBody>,
) -> Result<Json<Value>, ApiError> {
    let action = body
        .action
        .as_deref()
        .ok_or_else(|| {
            ApiError::Validation("action is required; must be one of: approve, reject".into())
        })
        .and_then(|s| {
            AlertAction::parse(s).ok_or_else(|| {
                ApiError::Validation("invalid action; must be one of: approve, reject".into())
            })
        })?;

    let alert = state
        .store
        .review_alert(id, action, body.reviewed_by, body.notes, Utc::now())
        .await?;

    if action == AlertAction::Approve {
        // Fire-and-forget: the review must not wait on downstream delivery.
        let notifier = state.notifier.clone();
        let approved = alert.clone();
        tokio::spawn(async move { notifier.alert_approved(&approved).await });
    }

    Ok(Json(json!({
        "success": true,
        "action": match action {
            AlertAction::Approve => "approve",
            AlertAction::Reject => "reject",
        },
        "data": alert_view(&alert),
    })))
}

// ---------------------------------------------------------------------------
// Flagged requests
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FlaggedView {
    id: Uuid,
    ts: DateTime<Utc>,
    channel: Channel,
    region: String,
    text_preview: String,
    urgency: &'static str,
    confidence: f64,
    category: String,
    emotion: EmotionCategory,
    status: RequestStatus,
}

fn flagged_view(r: &Request) -> FlaggedView {
    FlaggedView {
        id: r.id,
        ts: r.created_at,
        channel: r.channel,
        region: r.region.clone(),
        text_preview: r.text_content.chars().take(TEXT_PREVIEW_CHARS).collect(),
        urgency: r.urgency.unwrap_or(Urgency::Medium).as_upper(),
        confidence: r.confidence.unwrap_or(0.75),
        category: r.topic.clone().unwrap_or_else(|| "general".to_string()),
        emotion: r.emotion_category(),
        status: r.status,
    }
}

#[derive(Deserialize)]
struct FlaggedQuery {
    region: Option<String>,
    status: Option<String>,
    urgency: Option<String>,
}

async fn flagged_requests(
    State(state): State<AppState>,
    Query(q): Query<FlaggedQuery>,
) -> Result<Json<Vec<FlaggedView>>, ApiError> {
    let status = match q.status.as_deref() {
        None | Some("") => RequestStatus::Pending,
        Some(s) => RequestStatus::parse(s).ok_or_else(|| {
            ApiError::Validation(
                "status must be one of: pending, reviewed, escalated, dismissed".into(),
            )
        })?,
    };
    let urgency = match q.urgency.as_deref() {
        None | Some("") => None,
        // The dashboard sends uppercase; parsing is case-insensitive.
        Some(u) => Some(Urgency::parse(u).ok_or_else(|| {
            ApiError::Validation("urgency must be one of: high, medium, low".into())
        })?),
    };

    let requests = state
        .store
        .query_requests(&RequestFilter {
            region: q.region.clone(),
            flagged_only: true,
            status: Some(status),
            urgency,
            limit: Some(FLAGGED_LIMIT),
            ..Default::default()
        })
        .await?;
    Ok(Json(requests.iter().map(flagged_view).collect()))
}

#[derive(Deserialize)]
struct FlaggedPatchQuery {
    id: Option<Uuid>,
}

#[derive(Deserialize)]
struct FlaggedReviewBody {
    status: Option<String>,
    reviewed_by: Option<String>,
    review_notes: Option<String>,
}

async fn review_flagged(
    State(state): State<AppState>,
    Query(q): Query<FlaggedPatchQuery>,
    Json(body): Json<FlaggedReviewBody>,
) -> Result<Json<Value>, ApiError> {
    let id = q
        .id
        .ok_or_else(|| ApiError::Validation("id query parameter is required".into()))?;
    let status = body
        .status
        .as_deref()
        .and_then(RequestStatus::parse)
        .ok_or_else(|| {
            ApiError::Validation(
                "status must be one of: pending, reviewed, escalated, dismissed".into(),
            )
        })?;

    let updated = state
        .store
        .review_request(
            id,
            ReviewUpdate {
                status,
                reviewed_by: body.reviewed_by,
                review_notes: body.review_notes,
            },
            Utc::now(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "data": flagged_view(&updated) })))
}

// ---------------------------------------------------------------------------
// POST /generate-alerts — one sweep, on demand
// ---------------------------------------------------------------------------

async fn generate_alerts(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let drafts = anomaly::detect_anomalies(state.store.as_ref(), now).await;
    if drafts.is_empty() {
        return Ok(Json(json!({
            "success": true,
            "alerts_created": 0,
            "message": "no anomalies detected",
        })));
    }

    let inserted = state.store.insert_alerts(drafts, now).await?;
    let views: Vec<AlertView> = inserted.iter().map(alert_view).collect();
    Ok(Json(json!({
        "success": true,
        "alerts_created": views.len(),
        "alerts": views,
    })))
}
