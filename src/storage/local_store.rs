use rusqlite::config::DbConfig;
use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{params_from_iter, Batch, Connection, Result as SqliteResult, Statement};
use std::time::Instant;

use crate::models::{CellValue, QueryResult};

/// Quote an identifier for the local dialect: `"name"`, with `"` doubled.
///
/// SQLite ends a `[name]` identifier at the first `]`, so brackets cannot
/// carry every name; double quotes can.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Turn off SQLite's fallback that reads an unknown `"identifier"` as a
/// string literal, so a missing column is an error instead of a constant.
pub fn strict_identifiers(conn: &Connection) -> SqliteResult<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DML, false)?;
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DDL, false)?;
    Ok(())
}

/// Volatile in-memory SQLite database holding the mirrored tables.
///
/// The handle is not internally locked. Transactions that span awaits in the
/// transfer loop are driven with explicit `BEGIN`/`COMMIT`/`ROLLBACK` so no
/// borrow of the connection outlives a single call.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Create an empty in-memory store
    pub fn open_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        strict_identifiers(&conn)?;
        tracing::debug!("In-memory local store initialized");
        Ok(Self { conn })
    }

    /// Names of user tables, ordered by name, excluding SQLite internals
    pub fn list_tables(&self) -> SqliteResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut tables = Vec::new();
        for row in rows {
            tables.push(row?);
        }
        Ok(tables)
    }

    /// Drop every user table inside one transaction; all or nothing
    pub fn drop_all_tables(&mut self) -> SqliteResult<usize> {
        let tables = self.list_tables()?;
        let tx = self.conn.transaction()?;

        let result = tables.iter().try_for_each(|table| {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_identifier(table)))?;
            tracing::debug!("Dropped local table: {}", table);
            Ok::<_, rusqlite::Error>(())
        });

        match result {
            Ok(()) => {
                tx.commit()?;
                Ok(tables.len())
            }
            Err(e) => {
                let _ = tx.rollback();
                Err(e)
            }
        }
    }

    /// Run a statement that returns no rows (DDL or DML)
    pub fn execute(&self, sql: &str) -> SqliteResult<usize> {
        self.conn.execute(sql, [])
    }

    pub fn begin(&self) -> SqliteResult<()> {
        self.conn.execute_batch("BEGIN")
    }

    pub fn commit(&self) -> SqliteResult<()> {
        self.conn.execute_batch("COMMIT")
    }

    pub fn rollback(&self) -> SqliteResult<()> {
        self.conn.execute_batch("ROLLBACK")
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Bind `values` positionally to the cached statement `sql` and execute it
    pub fn insert_row(&self, sql: &str, values: &[CellValue]) -> SqliteResult<usize> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        stmt.execute(params_from_iter(values.iter()))
    }

    /// Execute arbitrary SQL and materialise the result.
    ///
    /// Several `;`-separated statements are run in order. The last statement
    /// that produced a result set wins; otherwise the affected-row count of
    /// the last statement is reported.
    pub fn query(&self, sql: &str) -> SqliteResult<QueryResult> {
        let start = Instant::now();
        let mut batch = Batch::new(&self.conn, sql);
        let mut last_rows: Option<QueryResult> = None;
        let mut last_affected: Option<QueryResult> = None;

        while let Some(mut stmt) = batch.next()? {
            if stmt.column_count() == 0 {
                let affected = stmt.execute([])?;
                last_affected = Some(QueryResult::affected(affected));
            } else {
                last_rows = Some(Self::collect_rows(&mut stmt)?);
            }
        }

        let mut result = last_rows.or(last_affected).unwrap_or_default();
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn collect_rows(stmt: &mut Statement<'_>) -> SqliteResult<QueryResult> {
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = names.len();

        let mut rows = stmt.query([])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                cells.push(CellValue::from(row.get_ref(idx)?));
            }
            values.push(cells);
        }

        Ok(QueryResult::from_rows(names, values))
    }

    /// Declared column names and types of a local table, in column order
    pub fn table_columns(&self, table: &str) -> SqliteResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    pub fn row_count(&self, table: &str) -> SqliteResult<u64> {
        self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u64)
    }

    /// Close the underlying connection
    pub fn close(self) -> SqliteResult<()> {
        self.conn.close().map_err(|(_, e)| e)
    }
}
