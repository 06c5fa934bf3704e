//! Domain types for helpline requests and region-level alerts.
//!
//! Sentiment and the four dashboard emotion buckets are *derived* from the
//! eleven-emotion classification, never stored or mutated independently.
//! The derivation functions here are the single source of those rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::window::Window;

/// Intake channel of a support request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Call,
    Chat,
    Survey,
}

impl Channel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Some(Self::Call),
            "chat" => Some(Self::Chat),
            "survey" => Some(Self::Survey),
            _ => None,
        }
    }
}

/// The eleven-emotion schema produced by the classification gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Disgust,
    Fear,
    Pessimism,
    Sadness,
    Happiness,
    Optimism,
    Anticipation,
    Surprise,
    Neutral,
    Confusion,
}

impl Emotion {
    /// Map a raw model label onto the stored schema. The upstream model
    /// emits a few labels outside the schema (`joy`, `love`); anything
    /// unknown falls back to `neutral`.
    pub fn from_model_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "anger" => Self::Anger,
            "disgust" => Self::Disgust,
            "fear" => Self::Fear,
            "pessimism" => Self::Pessimism,
            "sadness" => Self::Sadness,
            "joy" | "love" | "happiness" => Self::Happiness,
            "optimism" => Self::Optimism,
            "anticipation" => Self::Anticipation,
            "surprise" => Self::Surprise,
            "confusion" => Self::Confusion,
            _ => Self::Neutral,
        }
    }
}

/// Sentiment, always recomputed from the emotion label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// The only place the emotion → sentiment rule lives.
    pub fn from_emotion(emotion: Option<Emotion>) -> Self {
        use Emotion::*;
        match emotion {
            Some(Happiness | Optimism | Anticipation | Surprise) => Self::Positive,
            Some(Anger | Disgust | Fear | Pessimism | Sadness) => Self::Negative,
            Some(Neutral | Confusion) | None => Self::Neutral,
        }
    }
}

/// Four-bucket rollup of the eleven emotions used by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    Distress,
    Anger,
    Sadness,
    Calm,
}

impl EmotionCategory {
    /// 11 → 4 bucket map; unclassified requests count as calm.
    pub fn from_emotion(emotion: Option<Emotion>) -> Self {
        use Emotion::*;
        match emotion {
            Some(Fear | Pessimism) => Self::Distress,
            Some(Anger | Disgust) => Self::Anger,
            Some(Sadness) => Self::Sadness,
            Some(Happiness | Optimism | Anticipation | Surprise | Neutral | Confusion) | None => {
                Self::Calm
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Dashboard wire form ("HIGH" / "MEDIUM" / "LOW").
    pub fn as_upper(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// Review lifecycle of an individual request.
/// Created `pending`; one reviewer transition to a terminal state;
/// terminal states do not revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Reviewed,
    Escalated,
    Dismissed,
}

impl RequestStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "reviewed" => Some(Self::Reviewed),
            "escalated" => Some(Self::Escalated),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

/// A labeled support request. Immutable once labeled, apart from the
/// review fields which the store updates atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub channel: Channel,
    pub region: String,
    pub text_content: String,
    pub emotion: Option<Emotion>,
    pub topic: Option<String>,
    pub urgency: Option<Urgency>,
    pub confidence: Option<f64>,
    pub is_flagged: bool,
    pub status: RequestStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

impl Request {
    /// Unlabeled placeholder row, inserted before the classifier is called
    /// so ingestion survives classifier latency or failure.
    pub fn placeholder(
        channel: Channel,
        region: impl Into<String>,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            channel,
            region: region.into(),
            text_content: text.into(),
            emotion: None,
            topic: None,
            urgency: None,
            confidence: None,
            is_flagged: false,
            status: RequestStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
        }
    }

    pub fn sentiment(&self) -> Sentiment {
        Sentiment::from_emotion(self.emotion)
    }

    pub fn emotion_category(&self) -> EmotionCategory {
        EmotionCategory::from_emotion(self.emotion)
    }
}

/// Should a freshly labeled request be surfaced for human review?
///
/// Flag on high urgency, on a crisis override from the classifier, or on
/// medium urgency paired with an acute negative emotion.
pub fn should_flag(urgency: Option<Urgency>, reasons: &[String], emotion: Option<Emotion>) -> bool {
    matches!(urgency, Some(Urgency::High))
        || reasons.iter().any(|r| r == "crisis_override")
        || (matches!(urgency, Some(Urgency::Medium))
            && matches!(
                emotion,
                Some(Emotion::Anger | Emotion::Fear | Emotion::Sadness)
            ))
}

/// Labels written back onto a placeholder row after classification.
#[derive(Debug, Clone)]
pub struct RequestLabels {
    pub emotion: Option<Emotion>,
    pub topic: Option<String>,
    pub urgency: Option<Urgency>,
    pub confidence: Option<f64>,
    pub is_flagged: bool,
}

/// Reviewer action recorded on a request.
#[derive(Debug, Clone)]
pub struct ReviewUpdate {
    pub status: RequestStatus,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighEwi,
    EwiSpike,
    CrisisSurge,
    VolumeSpike,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighEwi => "high_ewi",
            Self::EwiSpike => "ewi_spike",
            Self::CrisisSurge => "crisis_surge",
            Self::VolumeSpike => "volume_spike",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Approved,
    Rejected,
}

impl AlertStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Reviewer action on a pending alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    Approve,
    Reject,
}

impl AlertAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn resulting_status(&self) -> AlertStatus {
        match self {
            Self::Approve => AlertStatus::Approved,
            Self::Reject => AlertStatus::Rejected,
        }
    }
}

/// Recommended operational action attached to an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Staffing,
    Routing,
    Messaging,
    Monitoring,
    Escalation,
    Operations,
}

/// A persisted, region-level alert with a pending → approved/rejected
/// lifecycle. Exactly one reviewer transition; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub region: String,
    pub alert_type: AlertType,
    pub summary: String,
    pub z_score: Option<f64>,
    pub related_topic: Option<String>,
    pub time_window: Window,
    pub status: AlertStatus,
    pub confidence: f64,
    /// Free-form evidence bag: contributing metrics, flagged_count,
    /// top_phrases, recommendations.
    pub metadata: serde_json::Value,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

/// An alert produced by the anomaly sweep, not yet persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AlertDraft {
    pub region: String,
    pub alert_type: AlertType,
    pub summary: String,
    pub z_score: f64,
    pub related_topic: Option<String>,
    pub time_window: Window,
    pub confidence: f64,
    pub metadata: serde_json::Value,
}

/// Idempotency key for alert deduplication: one alert of a given type per
/// region per hour bucket, no matter how often the sweep runs. The store
/// compares draft keys against persisted-alert keys; both sides derive
/// from here.
pub fn alert_dedup_key(region: &str, alert_type: AlertType, at: DateTime<Utc>) -> String {
    format!("{}:{}:{}", region, alert_type.as_str(), at.format("%Y-%m-%dT%H"))
}

impl AlertDraft {
    pub fn dedup_key(&self, now: DateTime<Utc>) -> String {
        alert_dedup_key(&self.region, self.alert_type, now)
    }
}

impl Alert {
    pub fn dedup_key(&self) -> String {
        alert_dedup_key(&self.region, self.alert_type, self.created_at)
    }
}
