//! Repository seam over the request and alert tables.
//!
//! The engines never hold state of their own; everything goes through
//! `RequestStore`. The in-memory implementation backs the binary and the
//! test suite; a SQL-backed store would implement the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use crate::model::{
    Alert, AlertAction, AlertDraft, AlertStatus, Channel, Request, RequestLabels, RequestStatus,
    ReviewUpdate, Urgency,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(Uuid),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Filter for request queries. `region` of `None` (or the `all` sentinel)
/// matches every region.
#[derive(Debug, Default, Clone)]
pub struct RequestFilter {
    pub region: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub channels: Option<Vec<Channel>>,
    pub flagged_only: bool,
    pub status: Option<RequestStatus>,
    pub urgency: Option<Urgency>,
    /// Cap on results, newest first.
    pub limit: Option<usize>,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert_request(&self, request: Request) -> Result<Request, StoreError>;

    /// Write classification labels onto a placeholder row.
    async fn update_request_labels(
        &self,
        id: Uuid,
        labels: RequestLabels,
    ) -> Result<Request, StoreError>;

    /// Record a reviewer decision. Rejects any transition away from a
    /// terminal state: reviews are one-shot.
    async fn review_request(
        &self,
        id: Uuid,
        review: ReviewUpdate,
        now: DateTime<Utc>,
    ) -> Result<Request, StoreError>;

    async fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError>;

    /// Persist sweep drafts, skipping any draft whose (region, type, hour
    /// bucket) already has an alert. Returns only the actually-inserted
    /// records.
    async fn insert_alerts(
        &self,
        drafts: Vec<AlertDraft>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError>;

    async fn query_alerts(
        &self,
        status: Option<AlertStatus>,
        region: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Alert>, StoreError>;

    async fn get_alert(&self, id: Uuid) -> Result<Alert, StoreError>;

    /// Apply a reviewer action to a *pending* alert; acting on an already
    /// reviewed alert is an invalid transition.
    async fn review_alert(
        &self,
        id: Uuid,
        action: AlertAction,
        reviewed_by: Option<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError>;

    /// Requests for one region with `since <= created_at < until`.
    async fn requests_in_range(
        &self,
        region: &str,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Request>, StoreError> {
        self.query_requests(&RequestFilter {
            region: Some(region.to_string()),
            since: Some(since),
            until,
            ..Default::default()
        })
        .await
    }
}

/// In-memory store. Mutex-guarded vectors; every operation is atomic at
/// the row level, which is all the engines need.
#[derive(Debug, Default)]
pub struct MemoryStore {
    requests: Mutex<Vec<Request>>,
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert_request(&self, request: Request) -> Result<Request, StoreError> {
        let mut rows = self.requests.lock().expect("request table mutex poisoned");
        rows.push(request.clone());
        Ok(request)
    }

    async fn update_request_labels(
        &self,
        id: Uuid,
        labels: RequestLabels,
    ) -> Result<Request, StoreError> {
        let mut rows = self.requests.lock().expect("request table mutex poisoned");
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        row.emotion = labels.emotion;
        row.topic = labels.topic;
        row.urgency = labels.urgency;
        row.confidence = labels.confidence;
        row.is_flagged = labels.is_flagged;
        Ok(row.clone())
    }

    async fn review_request(
        &self,
        id: Uuid,
        review: ReviewUpdate,
        now: DateTime<Utc>,
    ) -> Result<Request, StoreError> {
        let mut rows = self.requests.lock().expect("request table mutex poisoned");
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if row.status != RequestStatus::Pending {
            return Err(StoreError::InvalidTransition(format!(
                "request {id} already reviewed"
            )));
        }
        row.status = review.status;
        row.reviewed_by = review.reviewed_by;
        row.reviewed_at = Some(now);
        row.review_notes = review.review_notes;
        Ok(row.clone())
    }

    async fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        let rows = self.requests.lock().expect("request table mutex poisoned");
        let mut out: Vec<Request> = rows
            .iter()
            .filter(|r| match filter.region.as_deref() {
                None | Some(crate::aggregate::ALL_REGIONS) => true,
                Some(code) => r.region == code,
            })
            .filter(|r| filter.since.map_or(true, |t| r.created_at >= t))
            .filter(|r| filter.until.map_or(true, |t| r.created_at < t))
            .filter(|r| {
                filter
                    .channels
                    .as_ref()
                    .map_or(true, |cs| cs.contains(&r.channel))
            })
            .filter(|r| !filter.flagged_only || r.is_flagged)
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.urgency.map_or(true, |u| r.urgency == Some(u)))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn insert_alerts(
        &self,
        drafts: Vec<AlertDraft>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, StoreError> {
        let mut rows = self.alerts.lock().expect("alert table mutex poisoned");
        let mut inserted = Vec::new();
        for draft in drafts {
            let key = draft.dedup_key(now);
            if rows.iter().any(|a| a.dedup_key() == key) {
                tracing::debug!(%key, "skipping duplicate alert draft");
                continue;
            }
            let alert = Alert {
                id: Uuid::new_v4(),
                created_at: now,
                region: draft.region,
                alert_type: draft.alert_type,
                summary: draft.summary,
                z_score: Some(draft.z_score),
                related_topic: draft.related_topic,
                time_window: draft.time_window,
                status: AlertStatus::Pending,
                confidence: draft.confidence,
                metadata: draft.metadata,
                reviewed_by: None,
                reviewed_at: None,
                review_notes: None,
            };
            rows.push(alert.clone());
            inserted.push(alert);
        }
        Ok(inserted)
    }

    async fn query_alerts(
        &self,
        status: Option<AlertStatus>,
        region: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Alert>, StoreError> {
        let rows = self.alerts.lock().expect("alert table mutex poisoned");
        let mut out: Vec<Alert> = rows
            .iter()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .filter(|a| match region {
                None | Some(crate::aggregate::ALL_REGIONS) => true,
                Some(code) => a.region == code,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn get_alert(&self, id: Uuid) -> Result<Alert, StoreError> {
        let rows = self.alerts.lock().expect("alert table mutex poisoned");
        rows.iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn review_alert(
        &self,
        id: Uuid,
        action: AlertAction,
        reviewed_by: Option<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Alert, StoreError> {
        let mut rows = self.alerts.lock().expect("alert table mutex poisoned");
        let row = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if row.status != AlertStatus::Pending {
            return Err(StoreError::InvalidTransition(format!(
                "alert {id} already reviewed"
            )));
        }
        row.status = action.resulting_status();
        row.reviewed_by = reviewed_by;
        row.reviewed_at = Some(now);
        row.review_notes = notes;
        Ok(row.clone())
    }
}
