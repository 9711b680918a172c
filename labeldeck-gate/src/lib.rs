//! labeldeck-gate library interface
//!
//! Caching, rate limiting and access control core for the label dashboard,
//! plus the HTTP surface over it. Exposed as a library for integration tests.

pub mod access;
pub mod anr;
pub mod api;
pub mod audit;
pub mod auditors;
pub mod cache;
pub mod error;
pub mod insight;
pub mod orchestrator;
pub mod rate_limit;
pub mod record;
pub mod sources;
pub mod store;
pub mod votes;

pub use crate::error::{ApiError, ApiResult, GateError};

use crate::anr::AnrDesk;
use crate::audit::AuditService;
use crate::insight::InsightService;
use crate::orchestrator::Aggregator;
use crate::store::MemoryStore;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    /// Same roster the aggregator reads; handles admin writes
    pub roster: Arc<MemoryStore>,
    pub audits: Arc<AuditService>,
    pub insights: Arc<InsightService>,
    pub anr: Arc<AnrDesk>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        aggregator: Arc<Aggregator>,
        roster: Arc<MemoryStore>,
        audits: Arc<AuditService>,
        insights: Arc<InsightService>,
        anr: Arc<AnrDesk>,
    ) -> Self {
        Self {
            aggregator,
            roster,
            audits,
            insights,
            anr,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::artist_routes())
        .merge(api::integration_routes())
        .merge(api::anr_routes())
        .merge(api::export_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
