use serde::{Deserialize, Serialize};

use super::{CellValue, StorageClass};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryColumn {
    pub name: String,
    /// Storage class of the first non-NULL value in the column
    pub inferred_type: Option<StorageClass>,
}

/// Fully materialised result of one statement against the local store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<QueryColumn>,
    pub rows: Vec<Vec<CellValue>>,
    pub row_count: usize,
    /// Set for statements that return no result set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<usize>,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| QueryColumn {
                name,
                inferred_type: rows
                    .iter()
                    .filter_map(|row| row.get(idx).and_then(CellValue::storage_class))
                    .next(),
            })
            .collect();

        Self {
            columns,
            row_count: rows.len(),
            rows,
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    pub fn affected(rows_affected: usize) -> Self {
        Self {
            rows_affected: Some(rows_affected),
            ..Default::default()
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryChainRequest {
    /// Queries separated by the chain delimiter line
    pub script: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainResult {
    pub steps_executed: usize,
    pub last_result: Option<QueryResult>,
}

/// Edit of one cell in a previously displayed result row
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CellEdit {
    /// Target table; derived from `source_query` when absent
    #[serde(default)]
    pub table: Option<String>,
    /// SELECT that produced the row, re-run after the update
    #[serde(default)]
    pub source_query: Option<String>,
    pub column: String,
    pub new_value: String,
    /// Original values of the row, identifying it in the WHERE clause
    pub row: Vec<(String, CellValue)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellEditResult {
    pub update_sql: String,
    pub rows_affected: usize,
    /// Result of re-running the source query, when there was one
    pub refreshed: Option<QueryResult>,
}
