use axum::{extract::State, Json};

use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;

/// Tables the remote source offers for mirroring
pub async fn list_remote_tables(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut service = state.service.lock().await;
    let tables = service.list_remote_tables().await?;
    tracing::info!("Remote source reports {} mirrorable tables", tables.len());

    Ok(Json(serde_json::json!({
        "tables": tables,
    })))
}

/// Tables currently present in the local store
pub async fn list_local_tables(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = state.service.lock().await;
    let tables = service.list_local_tables()?;

    Ok(Json(serde_json::json!({
        "tables": tables,
    })))
}
