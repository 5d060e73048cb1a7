// SQLite file adapter: reads a database file through its own read-only connection
use crate::api::middleware::AppError;
use crate::models::{CellValue, ColumnDescriptor, RemoteTable};
use crate::services::remote::adapter::{build_select, channel_cursor, quote_ansi, RemoteSource, RowCursor};
use crate::storage::local_store::strict_identifiers;
use rusqlite::{Connection, OpenFlags};
use std::sync::{Arc, Mutex};

pub struct SqliteSource {
    path: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSource {
    /// Open `sqlite:<path>` (or `sqlite://<path>`) read-only
    pub fn open(descriptor: &str) -> Result<Self, AppError> {
        let path = Self::clean_path(descriptor);
        if path.is_empty() {
            return Err(AppError::Connection("SQLite descriptor has no path".to_string()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| AppError::Connection(format!("Failed to open SQLite source {}: {}", path, e)))?;
        strict_identifiers(&conn)
            .map_err(|e| AppError::Connection(format!("Failed to configure SQLite source {}: {}", path, e)))?;

        Ok(Self {
            path: path.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Handle SQLite URL format (sqlite:./path or sqlite://path)
    fn clean_path(descriptor: &str) -> &str {
        let trimmed = descriptor
            .strip_prefix("sqlite:")
            .or_else(|| descriptor.strip_prefix("SQLITE:"))
            .unwrap_or(descriptor);
        trimmed.trim_start_matches("//")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AppError::Connection("SQLite source connection is poisoned".to_string()))?;
            f(&guard).map_err(|e| AppError::Database(e.to_string()))
        })
        .await
        .map_err(|e| AppError::Internal(format!("SQLite worker failed: {}", e)))?
    }

    /// Declared type without length/precision, uppercased; untyped columns
    /// report BLOB, which is the affinity SQLite gives them
    fn normalize_type(declared: &str) -> String {
        let base = declared.split('(').next().unwrap_or("").trim();
        if base.is_empty() {
            "BLOB".to_string()
        } else {
            base.to_ascii_uppercase()
        }
    }
}

#[async_trait::async_trait]
impl RemoteSource for SqliteSource {
    fn source_type(&self) -> &str {
        "sqlite"
    }

    async fn list_tables(&self) -> Result<Vec<RemoteTable>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, type FROM sqlite_master WHERE type IN ('table', 'view') ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

            let mut tables = Vec::new();
            for row in rows {
                let (name, kind) = row?;
                let table_type = match kind.as_str() {
                    "view" => "VIEW",
                    _ if name.starts_with("sqlite_") => "SYSTEM TABLE",
                    _ => "TABLE",
                };
                tables.push(RemoteTable::new(name, Some(table_type)));
            }
            Ok(tables)
        })
        .await
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AppError> {
        let sql = format!("PRAGMA table_info({})", quote_ansi(table));
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: Option<String> = row.get(2)?;
                Ok(ColumnDescriptor::new(
                    name,
                    Self::normalize_type(declared.as_deref().unwrap_or("")),
                ))
            })?;

            let mut columns = Vec::new();
            for row in rows {
                columns.push(row?);
            }
            Ok(columns)
        })
        .await
        .map_err(|e| AppError::Schema(format!("Failed to get columns for {}: {}", table, e.message())))
    }

    async fn open_cursor(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        row_limit: u64,
    ) -> Result<RowCursor, AppError> {
        let sql = build_select(table, columns, row_limit, quote_ansi);
        let width = columns.len();
        let conn = self.conn.clone();
        let (tx, cursor) = channel_cursor();

        tracing::debug!("Opening SQLite cursor: {}", sql);
        tokio::task::spawn_blocking(move || {
            let produce = || -> rusqlite::Result<()> {
                let guard = match conn.lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        let _ = tx.blocking_send(Err(AppError::Connection(
                            "SQLite source connection is poisoned".to_string(),
                        )));
                        return Ok(());
                    }
                };
                let mut stmt = guard.prepare(&sql)?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(width);
                    for idx in 0..width {
                        values.push(CellValue::from(row.get_ref(idx)?));
                    }
                    // Receiver gone: the consumer has all the rows it wants
                    if tx.blocking_send(Ok(values)).is_err() {
                        break;
                    }
                }
                Ok(())
            };

            if let Err(e) = produce() {
                let _ = tx.blocking_send(Err(AppError::Transfer(format!("SQLite read failed: {}", e))));
            }
        });

        Ok(cursor)
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        tracing::debug!("Closing SQLite source {}", self.path);
        Ok(())
    }
}
