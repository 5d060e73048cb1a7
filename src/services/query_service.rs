use crate::api::middleware::AppError;
use crate::models::{ChainResult, QueryResult};
use crate::storage::LocalStore;

/// Runs ad hoc SQL against the local store
pub struct QueryService;

impl QueryService {
    /// Execute `sql` as-is and materialise the full result.
    ///
    /// Any statement kind is allowed. On failure nothing is returned and the
    /// store is left as the failed statement left it.
    pub fn execute(local: &LocalStore, sql: &str) -> Result<QueryResult, AppError> {
        tracing::debug!("Executing local query: {}", sql);

        let result = local.query(sql).map_err(|e| {
            let error_msg = format!("{}: {}", Self::classify(&e), e);
            tracing::error!("Query execution error: {}", error_msg);
            AppError::Query(error_msg)
        })?;

        tracing::info!(
            "Query returned {} rows in {}ms",
            result.row_count,
            result.execution_time_ms
        );
        Ok(result)
    }

    /// Run queries in order, stopping at the first failure.
    ///
    /// The error names the failing step (1-based); steps before it have
    /// already taken effect.
    pub fn execute_chain(local: &LocalStore, queries: &[String]) -> Result<ChainResult, AppError> {
        if queries.is_empty() {
            return Err(AppError::Validation("Query chain is empty".to_string()));
        }

        let total = queries.len();
        let mut last_result = None;
        for (idx, sql) in queries.iter().enumerate() {
            let result = Self::execute(local, sql).map_err(|e| {
                AppError::Query(format!("Step {} of {} failed: {}", idx + 1, total, e.message()))
            })?;
            last_result = Some(result);
        }

        Ok(ChainResult {
            steps_executed: total,
            last_result,
        })
    }

    fn classify(err: &rusqlite::Error) -> &'static str {
        let message = err.to_string();
        if message.contains("no such table") {
            "TABLE_NOT_FOUND"
        } else if message.contains("no such column") {
            "COLUMN_NOT_FOUND"
        } else if message.contains("syntax error") || message.contains("incomplete input") {
            "SQL_SYNTAX_ERROR"
        } else if message.contains("constraint failed") {
            "CONSTRAINT_VIOLATION"
        } else {
            "QUERY_EXECUTION_ERROR"
        }
    }
}
