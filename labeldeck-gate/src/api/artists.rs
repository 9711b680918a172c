//! Artist roster, aggregate, audit and insight endpoints

use crate::access::{self, Principal};
use crate::audit::AuditReport;
use crate::insight::Insight;
use crate::orchestrator::AggregatePage;
use crate::record::ArtistRecord;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

/// `?refresh=true` bypasses cached data
#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// GET /artists
///
/// Silently narrowed to the artists the caller may see.
pub async fn list_artists(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Json<AggregatePage> {
    let page = state
        .aggregator
        .list_aggregates(&principal, query.search.as_deref(), query.offset, query.limit)
        .await;
    Json(page)
}

/// GET /artists/:id
pub async fn get_artist(
    State(state): State<AppState>,
    principal: Principal,
    Path(artist_id): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<ArtistRecord>> {
    let record = state
        .aggregator
        .get_for(&principal, &artist_id, query.refresh)
        .await?;
    Ok(Json(record))
}

/// POST /artists
///
/// Admin only. Inserts or replaces a roster entry and drops its cached
/// aggregate. `201` for a new artist, `200` for a replacement.
pub async fn upsert_artist(
    State(state): State<AppState>,
    principal: Principal,
    Json(record): Json<ArtistRecord>,
) -> ApiResult<(StatusCode, Json<ArtistRecord>)> {
    access::require_admin(&principal)?;

    if record.id.trim().is_empty() || record.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Artist id and name are required".to_string(),
        ));
    }

    let replaced = state.roster.upsert(record.clone()).await;
    state.aggregator.invalidate(&record.id).await;

    info!(
        artist_id = %record.id,
        replaced = replaced,
        admin = %principal.id,
        "Roster entry saved"
    );

    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(record)))
}

/// GET /artists/:id/entity-audit
pub async fn entity_audit(
    State(state): State<AppState>,
    principal: Principal,
    Path(artist_id): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<AuditReport>> {
    let report = state
        .audits
        .audit_for(&principal, &artist_id, query.refresh)
        .await?;
    Ok(Json(report))
}

/// GET /artists/:id/insight/:period
///
/// `period` is `YYYY-MM` or `current`.
pub async fn artist_insight(
    State(state): State<AppState>,
    principal: Principal,
    Path((artist_id, period)): Path<(String, String)>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<Insight>> {
    let insight = state
        .insights
        .insight_for(&principal, &artist_id, &period, query.refresh)
        .await?;
    Ok(Json(insight))
}

pub fn artist_routes() -> Router<AppState> {
    Router::new()
        .route("/artists", get(list_artists).post(upsert_artist))
        .route("/artists/:id", get(get_artist))
        .route("/artists/:id/entity-audit", get(entity_audit))
        .route("/artists/:id/insight/:period", get(artist_insight))
}
