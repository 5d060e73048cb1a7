use axum::{extract::State, Json};

use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{CellEdit, CellEditResult, ChainResult, QueryChainRequest, QueryRequest, QueryResult};
use crate::validation::SqlValidator;

/// Execute SQL against the local store
pub async fn execute_query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResult>, AppError> {
    let sql = payload.sql.trim();
    if sql.is_empty() {
        return Err(AppError::Validation("SQL query cannot be empty".to_string()));
    }

    let service = state.service.lock().await;
    let result = service.execute(sql)?;

    Ok(Json(result))
}

/// Execute a delimiter-separated chain of queries
pub async fn execute_chain(
    State(state): State<AppState>,
    Json(payload): Json<QueryChainRequest>,
) -> Result<Json<ChainResult>, AppError> {
    let queries = SqlValidator::split_query_chain(&payload.script);
    tracing::info!("Executing query chain with {} steps", queries.len());

    let service = state.service.lock().await;
    let result = service.execute_chain(&queries)?;

    Ok(Json(result))
}

/// Write one edited cell back to its mirrored table
pub async fn update_cell(
    State(state): State<AppState>,
    Json(payload): Json<CellEdit>,
) -> Result<Json<CellEditResult>, AppError> {
    let service = state.service.lock().await;
    let result = service.apply_cell_edit(&payload)?;

    Ok(Json(result))
}
