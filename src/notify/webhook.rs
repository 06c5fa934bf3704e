use async_trait::async_trait;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::ApprovalNotifier;
use crate::model::Alert;

/// Forwards approved alerts to a configured webhook with a small
/// exponential-backoff retry.
#[derive(Clone)]
pub struct WebhookNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
struct ApprovalPayload<'a> {
    alert_id: String,
    region: &'a str,
    alert_type: &'a str,
    summary: &'a str,
    confidence: f64,
    approved_at: String,
}

impl WebhookNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = ApprovalPayload {
            alert_id: alert.id.to_string(),
            region: &alert.region,
            alert_type: alert.alert_type.as_str(),
            summary: &alert.summary,
            confidence: alert.confidence,
            approved_at: alert
                .reviewed_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("approval webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("approval webhook request failed: {e}"));
                }
            }
        }
    }
}

#[async_trait]
impl ApprovalNotifier for WebhookNotifier {
    async fn alert_approved(&self, alert: &Alert) {
        if let Err(e) = self.send(alert).await {
            tracing::warn!(alert_id = %alert.id, error = %e, "approval webhook delivery failed");
        }
    }
}
