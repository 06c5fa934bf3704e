// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod anomaly;
pub mod api;
pub mod classifier;
pub mod config;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod regions;
pub mod store;
pub mod sweep;
pub mod topic;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::store::{MemoryStore, RequestStore};
