//! Classification gateway client.
//!
//! The emotion/urgency labeling backend is an external service; this
//! module only knows its wire contract. Failures bubble up so the
//! ingestion route can report an upstream error while keeping the
//! placeholder row it already inserted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw classifier output for one text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub urgency: String,
    pub confidence: f64,
    pub emotion: String,
    pub emotion_confidence: f64,
    /// Decision trail, e.g. `calibrated_high` or `crisis_override`.
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> anyhow::Result<Prediction>;
}

/// HTTP client for the labeling backend (`POST {base}/analyze`).
#[derive(Clone)]
pub struct HttpClassifier {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> anyhow::Result<Prediction> {
        let url = format!("{}/analyze", self.base_url.trim_end_matches('/'));
        let rsp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(rsp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_deserializes_with_missing_reasons() {
        let p: Prediction = serde_json::from_str(
            r#"{"urgency":"high","confidence":0.91,"emotion":"fear","emotion_confidence":0.84}"#,
        )
        .unwrap();
        assert_eq!(p.urgency, "high");
        assert!(p.reasons.is_empty());
    }
}
