use std::collections::HashSet;

use crate::api::middleware::AppError;
use crate::models::{
    CellEdit, CellEditResult, ChainResult, MirrorReport, MirrorRequest, QueryResult, TableDescriptor,
    TableOutcome,
};
use crate::services::cell_edit::CellEditor;
use crate::services::connection_manager::ConnectionManager;
use crate::services::query_service::QueryService;
use crate::services::remote::RemoteSource;
use crate::services::schema_translator::SchemaTranslator;
use crate::services::transfer::RowTransfer;
use crate::storage::LocalStore;

/// Entry point for callers: connection lifecycle, mirror passes, and local queries.
///
/// Holds no locks of its own. Callers must not overlap operations; the HTTP
/// layer serialises them behind a mutex. Async methods take `&mut self` so
/// their futures stay `Send` while the local store is borrowed.
pub struct MirrorService {
    connections: ConnectionManager,
}

impl MirrorService {
    /// Create the service for `descriptor`; the local store opens immediately
    pub fn new(descriptor: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self::with_connections(ConnectionManager::new(descriptor)?))
    }

    pub fn with_connections(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub async fn open_remote(&mut self) -> Result<(), AppError> {
        self.connections.open_remote().await
    }

    pub fn is_remote_open(&self) -> bool {
        self.connections.is_remote_open()
    }

    pub async fn close(&mut self) {
        self.connections.close().await
    }

    /// Mirrorable remote tables: plain tables and entries without a type
    pub async fn list_remote_tables(&mut self) -> Result<Vec<String>, AppError> {
        let remote = self.connections.remote()?;
        let tables = remote.list_tables().await?;

        Ok(tables
            .into_iter()
            .filter(|t| t.is_mirrorable())
            .map(|t| t.name)
            .collect())
    }

    /// Local tables ordered by name, SQLite internals excluded
    pub fn list_local_tables(&self) -> Result<Vec<String>, AppError> {
        self.connections
            .local()?
            .list_tables()
            .map_err(|e| AppError::Database(format!("Failed to list local tables: {}", e)))
    }

    /// Replace the local store's content with a fresh copy of the requested tables.
    ///
    /// Clearing the store and resolving the table list are all-or-nothing and
    /// abort the pass on failure. After that every table is attempted on its
    /// own; a failing table is recorded in the report and the pass continues.
    pub async fn mirror(&mut self, request: MirrorRequest) -> Result<MirrorReport, AppError> {
        let (remote, local) = self.connections.both()?;
        let mut report = MirrorReport::start(request.row_limit);

        tracing::info!(
            "Starting mirror pass {} (row limit {})",
            report.run_id,
            request.row_limit
        );

        let dropped = local.drop_all_tables().map_err(|e| {
            tracing::error!("Failed to clear local store: {}", e);
            AppError::Database(format!("Failed to clear local store: {}", e))
        })?;
        tracing::debug!("Dropped {} local tables", dropped);

        let tables = Self::resolve_tables(remote, request.table_names.as_deref()).await?;
        tracing::info!("Mirroring {} tables", tables.len());

        for name in tables {
            let outcome = Self::mirror_table(remote, local, &name, request.row_limit).await;
            match &outcome {
                TableOutcome::Mirrored { rows } => {
                    tracing::debug!("Mirrored {} ({} rows)", name, rows)
                }
                TableOutcome::SkippedSchema { reason } => {
                    tracing::warn!("Skipped {}: {}", name, reason)
                }
                TableOutcome::SkippedTransfer { error } => {
                    tracing::warn!("Transfer of {} failed: {}", name, error)
                }
            }
            report.record(name, outcome);
        }

        report.finish();
        tracing::info!(
            "Mirror pass {} finished: {} mirrored, {} skipped, {} rows",
            report.run_id,
            report.mirrored_count(),
            report.skipped_count(),
            report.total_rows()
        );
        Ok(report)
    }

    async fn resolve_tables(
        remote: &dyn RemoteSource,
        requested: Option<&[String]>,
    ) -> Result<Vec<String>, AppError> {
        match requested {
            Some(names) => {
                let mut seen = HashSet::new();
                Ok(names
                    .iter()
                    .filter(|name| !name.is_empty())
                    .filter(|name| seen.insert(name.to_string()))
                    .cloned()
                    .collect())
            }
            None => {
                let tables = remote.list_tables().await.map_err(|e| {
                    tracing::error!("Failed to enumerate remote tables: {}", e);
                    e
                })?;
                Ok(tables
                    .into_iter()
                    .filter(|t| t.is_mirrorable())
                    .map(|t| t.name)
                    .collect())
            }
        }
    }

    async fn mirror_table(
        remote: &dyn RemoteSource,
        local: &mut LocalStore,
        name: &str,
        row_limit: u64,
    ) -> TableOutcome {
        let columns = match remote.list_columns(name).await {
            Ok(columns) => columns,
            Err(e) => {
                return TableOutcome::SkippedSchema {
                    reason: format!("Column discovery failed: {}", e.message()),
                }
            }
        };

        let table = TableDescriptor::new(name, columns);
        let create = match SchemaTranslator::generate_create_statement(&table.name, &table.columns) {
            Some(sql) => sql,
            None => {
                return TableOutcome::SkippedSchema {
                    reason: "No usable columns".to_string(),
                }
            }
        };

        if let Err(e) = local.execute(&create) {
            return TableOutcome::SkippedSchema {
                reason: format!("Failed to create local table: {}", e),
            };
        }

        match RowTransfer::transfer(remote, local, &table, row_limit).await {
            Ok(rows) => TableOutcome::Mirrored { rows },
            Err(e) => TableOutcome::SkippedTransfer {
                error: e.message().to_string(),
            },
        }
    }

    /// Copy rows of one remote table into its existing local table
    pub async fn transfer(&mut self, table_name: &str, row_limit: u64) -> Result<u64, AppError> {
        let (remote, local) = self.connections.both()?;
        let columns = remote.list_columns(table_name).await?;
        let table = TableDescriptor::new(table_name, columns);
        RowTransfer::transfer(remote, local, &table, row_limit).await
    }

    pub fn execute(&self, sql: &str) -> Result<QueryResult, AppError> {
        QueryService::execute(self.connections.local()?, sql)
    }

    pub fn execute_chain(&self, queries: &[String]) -> Result<ChainResult, AppError> {
        QueryService::execute_chain(self.connections.local()?, queries)
    }

    pub fn apply_cell_edit(&self, edit: &CellEdit) -> Result<CellEditResult, AppError> {
        CellEditor::apply(self.connections.local()?, edit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, ColumnDescriptor};
    use crate::services::remote::fake::FakeSource;
    use rusqlite::Connection;
    use tempfile::tempdir;

    fn cols(names: &[&str]) -> Vec<ColumnDescriptor> {
        names.iter().map(|n| ColumnDescriptor::new(*n, "INTEGER")).collect()
    }

    fn service(source: FakeSource) -> MirrorService {
        MirrorService::with_connections(ConnectionManager::with_remote(Box::new(source)).unwrap())
    }

    fn names(list: &[&str]) -> Option<Vec<String>> {
        Some(list.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_orders_mirrored_from_sqlite_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                r#"
                CREATE TABLE Orders (ID INTEGER, Name VARCHAR, Created DATETIME);
                INSERT INTO Orders VALUES (1, 'A', '2024-01-01T00:00:00');
                INSERT INTO Orders VALUES (2, 'B', NULL);
                "#,
            )
            .unwrap();

        let mut service = MirrorService::new(format!("sqlite:{}", path.display())).unwrap();
        service.open_remote().await.unwrap();
        assert_eq!(service.list_remote_tables().await.unwrap(), vec!["Orders"]);

        let report = service.mirror(MirrorRequest::all_tables(0)).await.unwrap();
        assert_eq!(report.outcome_of("Orders"), Some(&TableOutcome::Mirrored { rows: 2 }));

        let local = service.connections().local().unwrap();
        assert_eq!(
            local.table_columns("Orders").unwrap(),
            vec![
                ("ID".to_string(), "INTEGER".to_string()),
                ("Name".to_string(), "TEXT".to_string()),
                ("Created".to_string(), "TEXT".to_string()),
            ]
        );

        let result = service.execute("SELECT ID, Name, Created FROM Orders ORDER BY ID").unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![
                    CellValue::Integer(1),
                    CellValue::Text("A".into()),
                    CellValue::Text("2024-01-01T00:00:00".into())
                ],
                vec![CellValue::Integer(2), CellValue::Text("B".into()), CellValue::Null],
            ]
        );

        service.close().await;
    }

    #[tokio::test]
    async fn test_mirror_requires_open_remote() {
        let mut service = MirrorService::new("sqlite:not-opened.db").unwrap();
        let result = service.mirror(MirrorRequest::all_tables(0)).await;
        assert!(matches!(result, Err(AppError::Connection(_))));
    }

    #[tokio::test]
    async fn test_truncation() {
        let rows: Vec<_> = (0..10).map(|i| vec![CellValue::Integer(i)]).collect();
        let source = FakeSource::new().with_table("Big", cols(&["n"]), rows);
        let pulled = source.pulled();
        let mut service = service(source);

        let report = service.mirror(MirrorRequest::all_tables(3)).await.unwrap();
        assert_eq!(report.total_rows(), 3);
        assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 3);

        let result = service.execute("SELECT n FROM Big ORDER BY rowid").unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![CellValue::Integer(0)],
                vec![CellValue::Integer(1)],
                vec![CellValue::Integer(2)]
            ]
        );
    }

    #[tokio::test]
    async fn test_second_pass_replaces_first() {
        let source = FakeSource::new()
            .with_table("A", cols(&["x"]), vec![vec![CellValue::Integer(1)]])
            .with_table("B", cols(&["y"]), vec![vec![CellValue::Integer(2)]]);
        let mut service = service(source);

        service.mirror(MirrorRequest::new(0, names(&["A"]))).await.unwrap();
        assert_eq!(service.list_local_tables().unwrap(), vec!["A"]);

        service.mirror(MirrorRequest::new(0, names(&["B"]))).await.unwrap();
        assert_eq!(service.list_local_tables().unwrap(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_failing_table_does_not_abort_pass() {
        let source = FakeSource::new()
            .with_table("A", cols(&["x"]), vec![vec![CellValue::Integer(1)]])
            .with_table("B", cols(&["y"]), vec![vec![CellValue::Integer(2)]])
            .failing_schema("A");
        let mut service = service(source);

        let report = service.mirror(MirrorRequest::all_tables(0)).await.unwrap();
        assert!(matches!(
            report.outcome_of("A"),
            Some(TableOutcome::SkippedSchema { .. })
        ));
        assert_eq!(report.outcome_of("B"), Some(&TableOutcome::Mirrored { rows: 1 }));
        assert_eq!(service.list_local_tables().unwrap(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_transfer_failure_keeps_empty_table() {
        let rows: Vec<_> = (0..3).map(|i| vec![CellValue::Integer(i)]).collect();
        let source = FakeSource::new()
            .with_table("Flaky", cols(&["n"]), rows)
            .with_table("Fine", cols(&["n"]), vec![vec![CellValue::Integer(9)]])
            .failing_read("Flaky", 1);
        let mut service = service(source);

        let report = service.mirror(MirrorRequest::all_tables(0)).await.unwrap();
        assert!(matches!(
            report.outcome_of("Flaky"),
            Some(TableOutcome::SkippedTransfer { .. })
        ));
        assert_eq!(report.mirrored_count(), 1);

        let local = service.connections().local().unwrap();
        assert_eq!(local.row_count("Flaky").unwrap(), 0);
        assert_eq!(local.row_count("Fine").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_table_selection() {
        let source = FakeSource::new()
            .with_table("A", cols(&["x"]), Vec::new())
            .with_view("V", cols(&["x"]))
            .with_table("Empty", Vec::new(), Vec::new());
        let mut service = service(source);

        assert_eq!(service.list_remote_tables().await.unwrap(), vec!["A", "Empty"]);

        let report = service.mirror(MirrorRequest::all_tables(0)).await.unwrap();
        assert!(report.outcome_of("V").is_none());
        assert!(matches!(
            report.outcome_of("Empty"),
            Some(TableOutcome::SkippedSchema { .. })
        ));
        assert_eq!(service.list_local_tables().unwrap(), vec!["A"]);

        let report = service
            .mirror(MirrorRequest::new(0, names(&["A", "A", "Missing"])))
            .await
            .unwrap();
        assert_eq!(report.tables.len(), 2);
        assert!(matches!(
            report.outcome_of("Missing"),
            Some(TableOutcome::SkippedSchema { .. })
        ));
    }

    #[tokio::test]
    async fn test_names_with_closing_brackets() {
        let source = FakeSource::new().with_table(
            "we]ird",
            vec![
                ColumnDescriptor::new("c]ol", "VARCHAR"),
                ColumnDescriptor::new("has space", "INT"),
            ],
            vec![vec![CellValue::Text("v".into()), CellValue::Integer(5)]],
        );
        let mut service = service(source);

        let report = service.mirror(MirrorRequest::all_tables(0)).await.unwrap();
        assert_eq!(report.outcome_of("we]ird"), Some(&TableOutcome::Mirrored { rows: 1 }));

        let result = service.execute(r#"SELECT "c]ol", "has space" FROM "we]ird""#).unwrap();
        assert_eq!(
            result.rows,
            vec![vec![CellValue::Text("v".into()), CellValue::Integer(5)]]
        );
    }

    #[tokio::test]
    async fn test_single_table_transfer() {
        let source = FakeSource::new().with_table("A", cols(&["x"]), vec![vec![CellValue::Integer(1)]]);
        let mut service = service(source);

        // No local table yet
        assert!(matches!(service.transfer("A", 0).await, Err(AppError::Transfer(_))));

        service.execute("CREATE TABLE A (x INTEGER NULL)").unwrap();
        assert_eq!(service.transfer("A", 0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_after_close_fails() {
        let mut service = service(FakeSource::new());
        service.close().await;
        assert!(matches!(service.execute("SELECT 1"), Err(AppError::Connection(_))));
        assert!(matches!(service.list_remote_tables().await, Err(AppError::Connection(_))));
    }

    #[tokio::test]
    async fn test_failed_clear_aborts_pass_and_keeps_store() {
        let source = FakeSource::new().with_table("A", cols(&["x"]), vec![vec![CellValue::Integer(1)]]);
        let mut service = service(source);
        service.mirror(MirrorRequest::all_tables(0)).await.unwrap();

        // Dropping Customers fails while Orders still references its rows
        service
            .execute(
                "PRAGMA foreign_keys = ON;
                 CREATE TABLE Customers (id INTEGER PRIMARY KEY);
                 CREATE TABLE Orders (customer INTEGER REFERENCES Customers(id));
                 INSERT INTO Customers VALUES (1);
                 INSERT INTO Orders VALUES (1);",
            )
            .unwrap();

        let result = service.mirror(MirrorRequest::all_tables(0)).await;
        assert!(matches!(result, Err(AppError::Database(_))));

        assert_eq!(service.list_local_tables().unwrap(), vec!["A", "Customers", "Orders"]);
        let local = service.connections().local().unwrap();
        assert_eq!(local.row_count("A").unwrap(), 1);
        assert!(!local.in_transaction());
    }

    #[tokio::test]
    async fn test_mirror_after_close_fails() {
        let source = FakeSource::new().with_table("A", cols(&["x"]), Vec::new());
        let mut service = service(source);
        service.close().await;

        let result = service.mirror(MirrorRequest::all_tables(0)).await;
        assert!(matches!(result, Err(AppError::Connection(_))));
        assert!(!service.connections().is_local_open());
    }
}
