//! Approval side effects.
//!
//! Approving an alert conceptually triggers staffing/ops/audit actions
//! downstream. Those integrations live outside this service, so the hook
//! is a trait: the default deployment logs, an optional webhook forwards
//! the approval to whatever ops tooling is configured.

pub mod webhook;

use async_trait::async_trait;

use crate::model::Alert;

/// Hook invoked after an alert transitions to `approved`.
///
/// Implementations must not fail the review itself: log and move on.
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    async fn alert_approved(&self, alert: &Alert);
}

/// Default hook: a structured log line, nothing else.
pub struct NoopNotifier;

#[async_trait]
impl ApprovalNotifier for NoopNotifier {
    async fn alert_approved(&self, alert: &Alert) {
        tracing::info!(
            alert_id = %alert.id,
            region = %alert.region,
            alert_type = alert.alert_type.as_str(),
            "alert approved; no downstream notifier configured"
        );
    }
}
