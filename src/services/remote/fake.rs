// In-memory remote source for tests: scripted catalog, rows and failures
use crate::api::middleware::AppError;
use crate::models::{ColumnDescriptor, RemoteTable};
use crate::services::remote::adapter::{RemoteRow, RemoteSource, RowCursor};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
struct FakeTable {
    table_type: Option<String>,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<RemoteRow>,
}

#[derive(Default)]
pub struct FakeSource {
    order: Vec<String>,
    tables: HashMap<String, FakeTable>,
    schema_failures: HashSet<String>,
    /// Table name and the row index whose read fails
    read_failure: Option<(String, usize)>,
    pulled: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(
        mut self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<RemoteRow>,
    ) -> Self {
        self.push(name, Some("TABLE"), columns, rows);
        self
    }

    pub fn with_view(mut self, name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.push(name, Some("VIEW"), columns, Vec::new());
        self
    }

    pub fn failing_schema(mut self, name: &str) -> Self {
        self.schema_failures.insert(name.to_string());
        self
    }

    pub fn failing_read(mut self, name: &str, at_row: usize) -> Self {
        self.read_failure = Some((name.to_string(), at_row));
        self
    }

    /// Shared counter of rows handed out by every cursor
    pub fn pulled(&self) -> Arc<AtomicUsize> {
        self.pulled.clone()
    }

    fn push(&mut self, name: &str, table_type: Option<&str>, columns: Vec<ColumnDescriptor>, rows: Vec<RemoteRow>) {
        self.order.push(name.to_string());
        self.tables.insert(
            name.to_string(),
            FakeTable {
                table_type: table_type.map(str::to_string),
                columns,
                rows,
            },
        );
    }
}

#[async_trait::async_trait]
impl RemoteSource for FakeSource {
    fn source_type(&self) -> &str {
        "fake"
    }

    async fn list_tables(&self) -> Result<Vec<RemoteTable>, AppError> {
        Ok(self
            .order
            .iter()
            .map(|name| RemoteTable::new(name.clone(), self.tables[name].table_type.as_deref()))
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AppError> {
        if self.schema_failures.contains(table) {
            return Err(AppError::Schema(format!("catalog unavailable for {}", table)));
        }
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn open_cursor(
        &self,
        table: &str,
        _columns: &[ColumnDescriptor],
        row_limit: u64,
    ) -> Result<RowCursor, AppError> {
        let limit = if row_limit > 0 { row_limit as usize } else { usize::MAX };
        let rows = self
            .tables
            .get(table)
            .map(|t| t.rows.iter().take(limit).cloned().collect::<Vec<_>>())
            .ok_or_else(|| AppError::Transfer(format!("no such table: {}", table)))?;

        let fail_at = self
            .read_failure
            .as_ref()
            .filter(|(name, _)| name == table)
            .map(|(_, idx)| *idx);
        let pulled = self.pulled.clone();

        Ok(stream::iter(rows.into_iter().enumerate())
            .map(move |(idx, row)| {
                pulled.fetch_add(1, Ordering::SeqCst);
                if Some(idx) == fail_at {
                    Err(AppError::Transfer(format!("read failed at row {}", idx)))
                } else {
                    Ok(row)
                }
            })
            .boxed())
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}
