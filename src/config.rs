//! Service configuration from the environment.

use std::env;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CLASSIFIER_URL: &str = "http://localhost:8000";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    /// Base URL of the classification gateway.
    pub classifier_url: String,
    /// Spawn the periodic anomaly sweep (`SWEEP_ENABLED=1`).
    pub sweep_enabled: bool,
    pub sweep_interval_secs: u64,
    /// Optional webhook receiving approved alerts.
    pub approval_webhook: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            classifier_url: env::var("CLASSIFIER_URL")
                .unwrap_or_else(|_| DEFAULT_CLASSIFIER_URL.to_string()),
            sweep_enabled: env::var("SWEEP_ENABLED").ok().is_some_and(|v| v == "1"),
            sweep_interval_secs,
            approval_webhook: env::var("APPROVAL_WEBHOOK")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}
