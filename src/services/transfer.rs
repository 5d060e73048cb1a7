use futures::StreamExt;

use crate::api::middleware::AppError;
use crate::models::{BindType, TableDescriptor};
use crate::services::remote::{RemoteRow, RemoteSource, RowCursor};
use crate::services::schema_translator::SchemaTranslator;
use crate::services::type_mapper::TypeMapper;
use crate::storage::LocalStore;

/// Streams one remote table into its already-created local table
pub struct RowTransfer;

impl RowTransfer {
    /// Copy up to `row_limit` rows (0 = all) of `table` and return how many were written.
    ///
    /// All rows land in a single local transaction. An empty source opens no
    /// transaction at all. On a read or write failure the transaction is
    /// rolled back and nothing from this table is kept.
    ///
    /// `local` is taken mutably so the exclusive borrow can be held across
    /// the awaits of the read loop.
    pub async fn transfer(
        remote: &dyn RemoteSource,
        local: &mut LocalStore,
        table: &TableDescriptor,
        row_limit: u64,
    ) -> Result<u64, AppError> {
        if table.is_empty() {
            return Err(AppError::Schema(format!(
                "Table {} has no usable columns",
                table.name
            )));
        }

        let insert = SchemaTranslator::generate_insert_statement(table);
        let bind_types: Vec<BindType> = table
            .columns
            .iter()
            .map(|column| TypeMapper::bind_type(column, Some(remote)))
            .collect();

        tracing::debug!(
            "Transferring {} (limit {}): {}",
            table.name,
            row_limit,
            insert.sql
        );

        let mut cursor = remote
            .open_cursor(&table.name, &table.columns, row_limit)
            .await
            .map_err(|e| Self::wrap(&table.name, e))?;

        let first = match cursor.next().await {
            None => {
                tracing::debug!("Remote table {} is empty, nothing to transfer", table.name);
                return Ok(0);
            }
            Some(row) => row.map_err(|e| Self::wrap(&table.name, e))?,
        };

        local
            .begin()
            .map_err(|e| AppError::Transfer(format!("Failed to begin transaction for {}: {}", table.name, e)))?;

        let result = Self::copy_rows(&mut cursor, local, &insert.sql, &bind_types, first, row_limit, &table.name)
            .await
            .and_then(|count| {
                local
                    .commit()
                    .map(|()| count)
                    .map_err(|e| AppError::Transfer(format!("Failed to commit {}: {}", table.name, e)))
            });

        match result {
            Ok(count) => {
                tracing::info!("Transferred {} rows into {}", count, table.name);
                Ok(count)
            }
            Err(e) => {
                if let Err(rollback_err) = local.rollback() {
                    tracing::warn!("Rollback of {} failed: {}", table.name, rollback_err);
                }
                tracing::error!("Transfer of {} failed: {}", table.name, e);
                Err(e)
            }
        }
    }

    async fn copy_rows(
        cursor: &mut RowCursor,
        local: &mut LocalStore,
        sql: &str,
        bind_types: &[BindType],
        first: RemoteRow,
        row_limit: u64,
        table_name: &str,
    ) -> Result<u64, AppError> {
        let mut transferred: u64 = 0;
        let mut next = Some(first);

        while let Some(row) = next {
            if row.len() != bind_types.len() {
                return Err(AppError::Transfer(format!(
                    "Row from {} has {} values, expected {}",
                    table_name,
                    row.len(),
                    bind_types.len()
                )));
            }

            let values: Vec<_> = row
                .into_iter()
                .zip(bind_types)
                .map(|(value, bind)| value.coerce(*bind))
                .collect();

            local
                .insert_row(sql, &values)
                .map_err(|e| AppError::Transfer(format!("Failed to insert into {}: {}", table_name, e)))?;
            transferred += 1;

            // Cap reached: stop before asking the cursor for another row
            if row_limit > 0 && transferred >= row_limit {
                tracing::debug!("Row limit {} reached for {}", row_limit, table_name);
                break;
            }

            next = match cursor.next().await {
                Some(row) => Some(row.map_err(|e| Self::wrap(table_name, e))?),
                None => None,
            };
        }

        Ok(transferred)
    }

    fn wrap(table_name: &str, err: AppError) -> AppError {
        match err {
            AppError::Transfer(_) => err,
            other => AppError::Transfer(format!("Failed to read {}: {}", table_name, other.message())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, ColumnDescriptor};
    use crate::services::remote::fake::FakeSource;
    use crate::services::remote::SqliteSource;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("ID", "INTEGER"),
            ColumnDescriptor::new("Name", "VARCHAR"),
        ]
    }

    fn rows(n: i64) -> Vec<RemoteRow> {
        (1..=n)
            .map(|i| vec![CellValue::Integer(i), CellValue::Text(format!("row {}", i))])
            .collect()
    }

    fn prepared_store(table: &TableDescriptor) -> LocalStore {
        let store = LocalStore::open_in_memory().unwrap();
        let create = SchemaTranslator::generate_create_statement(&table.name, &table.columns).unwrap();
        store.execute(&create).unwrap();
        store
    }

    #[tokio::test]
    async fn test_transfer_all_rows() {
        let source = FakeSource::new().with_table("Items", columns(), rows(3));
        let table = TableDescriptor::new("Items", columns());
        let mut store = prepared_store(&table);

        let count = RowTransfer::transfer(&source, &mut store, &table, 0).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(store.row_count("Items").unwrap(), 3);
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_row_limit_stops_reading() {
        let source = FakeSource::new().with_table("Items", columns(), rows(10));
        let pulled = source.pulled();
        let table = TableDescriptor::new("Items", columns());
        let mut store = prepared_store(&table);

        let count = RowTransfer::transfer(&source, &mut store, &table, 4).await.unwrap();
        assert_eq!(count, 4);
        assert_eq!(pulled.load(Ordering::SeqCst), 4);

        let result = store.query("SELECT ID FROM Items ORDER BY rowid").unwrap();
        let ids: Vec<_> = result.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            ids,
            vec![
                CellValue::Integer(1),
                CellValue::Integer(2),
                CellValue::Integer(3),
                CellValue::Integer(4)
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_source_opens_no_transaction() {
        let source = FakeSource::new().with_table("Items", columns(), Vec::new());
        let table = TableDescriptor::new("Items", columns());
        let mut store = prepared_store(&table);

        assert_eq!(RowTransfer::transfer(&source, &mut store, &table, 0).await.unwrap(), 0);
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_read_failure_rolls_back() {
        let source = FakeSource::new()
            .with_table("Items", columns(), rows(5))
            .failing_read("Items", 3);
        let table = TableDescriptor::new("Items", columns());
        let mut store = prepared_store(&table);

        let result = RowTransfer::transfer(&source, &mut store, &table, 0).await;
        assert!(matches!(result, Err(AppError::Transfer(_))));
        assert_eq!(store.row_count("Items").unwrap(), 0);
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_write_failure_rolls_back() {
        let source = FakeSource::new().with_table("Items", columns(), rows(2));
        let table = TableDescriptor::new("Items", columns());
        // Local table deliberately missing
        let mut store = LocalStore::open_in_memory().unwrap();

        let result = RowTransfer::transfer(&source, &mut store, &table, 0).await;
        assert!(matches!(result, Err(AppError::Transfer(_))));
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_values_coerced_to_bind_type() {
        let cols = vec![
            ColumnDescriptor::new("Qty", "INT"),
            ColumnDescriptor::new("Active", "BIT"),
            ColumnDescriptor::new("Code", "VARCHAR"),
        ];
        let source = FakeSource::new().with_table(
            "Stock",
            cols.clone(),
            vec![vec![
                CellValue::Text("42".into()),
                CellValue::Text("true".into()),
                CellValue::Integer(7),
            ]],
        );
        let table = TableDescriptor::new("Stock", cols);
        let mut store = prepared_store(&table);

        RowTransfer::transfer(&source, &mut store, &table, 0).await.unwrap();
        let result = store.query("SELECT Qty, Active, Code FROM Stock").unwrap();
        assert_eq!(
            result.rows[0],
            vec![
                CellValue::Integer(42),
                CellValue::Integer(1),
                CellValue::Text("7".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_transfer_from_sqlite_file_with_odd_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(
                r#"
                CREATE TABLE "we]ird" ("col]one" INTEGER, "has space" TEXT, "a.b-c" REAL);
                INSERT INTO "we]ird" VALUES (1, 'x', 1.5), (NULL, NULL, NULL);
                "#,
            )
            .unwrap();

        let source = SqliteSource::open(&format!("sqlite:{}", path.display())).unwrap();
        let table = TableDescriptor::new("we]ird", source.list_columns("we]ird").await.unwrap());
        let mut store = prepared_store(&table);

        assert_eq!(RowTransfer::transfer(&source, &mut store, &table, 0).await.unwrap(), 2);
        let result = store
            .query(r#"SELECT "col]one", "has space", "a.b-c" FROM "we]ird" ORDER BY rowid"#)
            .unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![CellValue::Integer(1), CellValue::Text("x".into()), CellValue::Real(1.5)],
                vec![CellValue::Null, CellValue::Null, CellValue::Null],
            ]
        );
    }
}
