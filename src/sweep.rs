//! Background anomaly sweep.
//!
//! One tokio task owns the schedule, so runs are serialized by
//! construction: a slow sweep simply delays the next tick, and two
//! sweeps can never race each other into duplicate inserts. Alert
//! deduplication at the store covers the on-demand `/generate-alerts`
//! endpoint racing the scheduler.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::task::JoinHandle;

use crate::anomaly;
use crate::store::RequestStore;

#[derive(Clone, Copy, Debug)]
pub struct SweepCfg {
    pub interval_secs: u64,
}

pub fn spawn_sweep_scheduler(cfg: SweepCfg, store: Arc<dyn RequestStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();

            let drafts = anomaly::detect_anomalies(store.as_ref(), now).await;
            let created = if drafts.is_empty() {
                0
            } else {
                match store.insert_alerts(drafts, now).await {
                    Ok(inserted) => inserted.len(),
                    Err(e) => {
                        tracing::error!(error = %e, "sweep alert insert failed");
                        0
                    }
                }
            };

            counter!("sweep_runs_total").increment(1);
            counter!("sweep_alerts_created_total").increment(created as u64);
            gauge!("sweep_last_run_ts").set(now.timestamp() as f64);

            tracing::info!(target: "sweep", created, "anomaly sweep tick");
        }
    })
}
