//! Data export endpoint
//!
//! Rows are aggregates flattened to dotted keys (`"social.spotify": 123`)
//! so they load directly into spreadsheet tooling. A label-wide export (no
//! `artist_id`) is admin-only even for callers entitled to every artist.

use crate::access::{self, Principal};
use crate::record::ArtistRecord;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;

pub type ExportRow = BTreeMap<String, Value>;

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub artist_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub rows: Vec<ExportRow>,
}

/// Flatten nested objects into dotted keys; arrays stay as values
pub fn flatten_record(record: &ArtistRecord) -> Result<ExportRow, serde_json::Error> {
    let mut row = ExportRow::new();
    if let Value::Object(map) = serde_json::to_value(record)? {
        flatten_into(&mut row, None, map);
    }
    Ok(row)
}

fn flatten_into(row: &mut ExportRow, prefix: Option<&str>, map: Map<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key,
        };
        match value {
            Value::Object(nested) => flatten_into(row, Some(&path), nested),
            other => {
                row.insert(path, other);
            }
        }
    }
}

/// GET /exports?artist_id=
pub async fn export_data(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Json<ExportResponse>> {
    let artist_id = query.artist_id.as_deref().filter(|id| !id.is_empty());
    access::authorize_export(&principal, artist_id)?;

    let records = match artist_id {
        Some(id) => vec![state.aggregator.get_aggregate(id, false).await?],
        None => {
            state
                .aggregator
                .list_aggregates(&principal, None, 0, None)
                .await
                .items
        }
    };

    let rows = records
        .iter()
        .map(flatten_record)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::Internal(format!("Export serialization failed: {}", e)))?;

    info!(
        principal = %principal.id,
        artist_id = ?artist_id,
        rows = rows.len(),
        "Export generated"
    );

    Ok(Json(ExportResponse {
        generated_at: chrono::Utc::now(),
        rows,
    }))
}

pub fn export_routes() -> Router<AppState> {
    Router::new().route("/exports", get(export_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_uses_dotted_keys() {
        let mut record = ArtistRecord::new("art_rezz", "REZZ");
        record.social.spotify = Some(123);
        record.revenue.streaming = Some(10.5);
        record.meta.data_sources = vec!["spotify".to_string()];

        let row = flatten_record(&record).unwrap();

        assert_eq!(row.get("id"), Some(&json!("art_rezz")));
        assert_eq!(row.get("social.spotify"), Some(&json!(123)));
        assert_eq!(row.get("revenue.streaming"), Some(&json!(10.5)));
        assert_eq!(row.get("meta.dataSources"), Some(&json!(["spotify"])));
        assert!(!row.contains_key("social"));
    }
}
