//! Integration status and limiter check endpoints

use crate::access::{self, Principal};
use crate::sources::IntegrationStatus;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

/// Result of taking one limiter token
#[derive(Debug, Serialize)]
pub struct TestLimitResponse {
    pub service: String,
    /// How long the request was held back
    pub waited_ms: u64,
    /// Bucket level after the token was taken
    pub tokens_remaining: f64,
}

/// GET /integrations/status
pub async fn integration_status(
    State(state): State<AppState>,
    _principal: Principal,
) -> Json<IntegrationStatus> {
    Json(state.aggregator.integration_status())
}

/// GET /integrations/test-limit/:service
///
/// Takes one real token from `service`'s bucket. Admin only.
pub async fn test_limit(
    State(state): State<AppState>,
    principal: Principal,
    Path(service): Path<String>,
) -> ApiResult<Json<TestLimitResponse>> {
    access::require_admin(&principal)?;

    let limiter = state.aggregator.limiter();
    if !limiter.is_configured(&service) {
        return Err(ApiError::NotFound(format!("Unknown service: {}", service)));
    }

    let waited = limiter.throttle(&service).await?;
    let tokens_remaining = limiter.tokens(&service).await?;

    info!(
        service = %service,
        waited_ms = waited.as_millis() as u64,
        tokens_remaining = tokens_remaining,
        "Rate limit check"
    );

    Ok(Json(TestLimitResponse {
        service,
        waited_ms: waited.as_millis() as u64,
        tokens_remaining,
    }))
}

pub fn integration_routes() -> Router<AppState> {
    Router::new()
        .route("/integrations/status", get(integration_status))
        .route("/integrations/test-limit/:service", get(test_limit))
}
