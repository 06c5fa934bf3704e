use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use rukn_monitor::classifier::HttpClassifier;
use rukn_monitor::config::ServiceConfig;
use rukn_monitor::metrics::Metrics;
use rukn_monitor::notify::{webhook::WebhookNotifier, ApprovalNotifier, NoopNotifier};
use rukn_monitor::sweep::{spawn_sweep_scheduler, SweepCfg};
use rukn_monitor::{AppState, MemoryStore, RequestStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .compact()
        .init();

    let cfg = ServiceConfig::from_env();
    let metrics = Metrics::init();

    let store: Arc<dyn RequestStore> = Arc::new(MemoryStore::new());
    let classifier = Arc::new(HttpClassifier::new(cfg.classifier_url.clone()));
    let notifier: Arc<dyn ApprovalNotifier> = match &cfg.approval_webhook {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NoopNotifier),
    };

    if cfg.sweep_enabled {
        let sweep_cfg = SweepCfg {
            interval_secs: cfg.sweep_interval_secs,
        };
        spawn_sweep_scheduler(sweep_cfg, Arc::clone(&store));
        tracing::info!(interval_secs = cfg.sweep_interval_secs, "anomaly sweep enabled");
    }

    let state = AppState {
        store,
        classifier,
        notifier,
    };

    let app = rukn_monitor::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
