use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;

use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{MirrorReport, MirrorRequest};

#[derive(Debug, Default, Deserialize)]
pub struct MirrorPayload {
    /// Falls back to the configured default row limit
    pub row_limit: Option<u64>,
    /// Falls back to the configured table list, then to every remote table
    pub tables: Option<Vec<String>>,
}

impl MirrorPayload {
    /// An empty body means "use the configured defaults"
    fn parse(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid mirror request: {}", e)))
    }
}

/// Run one mirror pass
pub async fn run_mirror(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MirrorReport>, AppError> {
    let payload = MirrorPayload::parse(&body)?;

    let row_limit = payload
        .row_limit
        .unwrap_or(state.config.mirror.default_row_limit);
    let tables = payload.tables.or_else(|| state.config.mirror.tables.clone());

    if let Some(names) = &tables {
        if names.iter().all(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("Table list cannot be empty".to_string()));
        }
    }

    let mut service = state.service.lock().await;
    let report = service.mirror(MirrorRequest::new(row_limit, tables)).await?;

    Ok(Json(report))
}
