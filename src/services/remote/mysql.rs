// MySQL adapter: one long-lived connection shared behind an async mutex
use crate::api::middleware::AppError;
use crate::models::{CellValue, ColumnDescriptor, RemoteTable};
use crate::services::remote::adapter::{
    build_select, bytes_to_cell, channel_cursor, quote_backtick, RemoteSource, RowCursor,
};
use mysql_async::{prelude::*, Conn, Opts, Value as MySqlValue};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

pub struct MySqlSource {
    conn: Arc<Mutex<Conn>>,
}

impl MySqlSource {
    pub async fn connect(connection_url: &str) -> Result<Self, AppError> {
        let url = Url::parse(connection_url)
            .map_err(|e| AppError::Connection(format!("Invalid MySQL URL: {}", e)))?;

        if url.scheme() != "mysql" && url.scheme() != "mariadb" {
            return Err(AppError::Connection("URL must use mysql:// or mariadb:// scheme".to_string()));
        }

        // The driver only understands the mysql scheme
        let mut normalized = url.clone();
        if url.scheme() == "mariadb" {
            let rest = &connection_url["mariadb".len()..];
            normalized = Url::parse(&format!("mysql{}", rest))
                .map_err(|e| AppError::Connection(format!("Invalid MySQL URL: {}", e)))?;
        }

        let opts = Opts::from_url(normalized.as_str())
            .map_err(|e| AppError::Connection(format!("Invalid MySQL URL: {}", e)))?;
        let conn = Conn::new(opts)
            .await
            .map_err(|e| AppError::Connection(format!("Failed to connect to MySQL: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Generic type name for an information_schema DATA_TYPE
    fn generic_type_name(data_type: &str) -> String {
        let upper = data_type.trim().to_ascii_uppercase();
        let name = match upper.as_str() {
            "MEDIUMINT" => "INT",
            "YEAR" => "SMALLINT",
            "BOOL" => "BOOLEAN",
            "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => "TEXT",
            "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => "BLOB",
            _ => return upper,
        };
        name.to_string()
    }

    /// Cell for a value read from a column; BIT columns keep their raw bytes
    /// (the packed bits) instead of being read as text
    fn column_cell(value: MySqlValue, is_bit: bool) -> CellValue {
        match value {
            MySqlValue::Bytes(bytes) if is_bit => CellValue::Blob(bytes),
            other => Self::value_to_cell(other),
        }
    }

    fn value_to_cell(value: MySqlValue) -> CellValue {
        match value {
            MySqlValue::NULL => CellValue::Null,
            MySqlValue::Bytes(bytes) => bytes_to_cell(bytes),
            MySqlValue::Int(i) => CellValue::Integer(i),
            MySqlValue::UInt(u) => match i64::try_from(u) {
                Ok(i) => CellValue::Integer(i),
                Err(_) => CellValue::Text(u.to_string()),
            },
            MySqlValue::Float(f) => CellValue::Real(f as f64),
            MySqlValue::Double(d) => CellValue::Real(d),
            MySqlValue::Date(y, m, d, 0, 0, 0, 0) => {
                CellValue::Text(format!("{:04}-{:02}-{:02}", y, m, d))
            }
            MySqlValue::Date(y, m, d, h, min, s, micros) => {
                let mut text = format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}", y, m, d, h, min, s);
                if micros > 0 {
                    text.push_str(&format!(".{:06}", micros));
                }
                CellValue::Text(text)
            }
            MySqlValue::Time(is_neg, days, h, m, s, _) => {
                let sign = if is_neg { "-" } else { "" };
                let total_hours = days * 24 + h as u32;
                CellValue::Text(format!("{}{:02}:{:02}:{:02}", sign, total_hours, m, s))
            }
        }
    }
}

#[async_trait::async_trait]
impl RemoteSource for MySqlSource {
    fn source_type(&self) -> &str {
        "mysql"
    }

    async fn list_tables(&self) -> Result<Vec<RemoteTable>, AppError> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<(String, String)> = conn
            .query(
                r#"
                SELECT TABLE_NAME, TABLE_TYPE
                FROM information_schema.TABLES
                WHERE TABLE_SCHEMA = DATABASE()
                ORDER BY TABLE_NAME
                "#,
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to get tables: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(name, table_type)| {
                let normalized = match table_type.as_str() {
                    "BASE TABLE" => "TABLE",
                    "VIEW" => "VIEW",
                    _ => "SYSTEM TABLE",
                };
                RemoteTable::new(name, Some(normalized))
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AppError> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<(String, String)> = conn
            .exec(
                r#"
                SELECT COLUMN_NAME, DATA_TYPE
                FROM information_schema.COLUMNS
                WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                ORDER BY ORDINAL_POSITION
                "#,
                (table,),
            )
            .await
            .map_err(|e| AppError::Schema(format!("Failed to get columns for {}: {}", table, e)))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type)| ColumnDescriptor::new(name, Self::generic_type_name(&data_type)))
            .collect())
    }

    async fn open_cursor(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        row_limit: u64,
    ) -> Result<RowCursor, AppError> {
        let sql = build_select(table, columns, row_limit, quote_backtick);
        let bit_columns: Vec<bool> = columns
            .iter()
            .map(|c| c.remote_type_name.eq_ignore_ascii_case("BIT"))
            .collect();
        let conn = self.conn.clone();
        let (tx, cursor) = channel_cursor();

        tracing::debug!("Opening MySQL cursor: {}", sql);
        tokio::spawn(async move {
            let mut conn = conn.lock_owned().await;
            let mut result = match conn.query_iter(sql).await {
                Ok(result) => result,
                Err(e) => {
                    let _ = tx.send(Err(AppError::Transfer(format!("MySQL read failed: {}", e)))).await;
                    return;
                }
            };

            loop {
                match result.next().await {
                    Ok(Some(mut row)) => {
                        let values: Vec<CellValue> = bit_columns
                            .iter()
                            .enumerate()
                            .map(|(idx, is_bit)| {
                                row.take::<MySqlValue, usize>(idx)
                                    .map(|value| Self::column_cell(value, *is_bit))
                                    .unwrap_or(CellValue::Null)
                            })
                            .collect();
                        // Receiver gone: the consumer has all the rows it wants
                        if tx.send(Ok(values)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(AppError::Transfer(format!("MySQL read failed: {}", e)))).await;
                        break;
                    }
                }
            }
        });

        Ok(cursor)
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        match Arc::try_unwrap(self.conn) {
            Ok(conn) => conn
                .into_inner()
                .disconnect()
                .await
                .map_err(|e| AppError::Connection(format!("Failed to close MySQL connection: {}", e))),
            // A cursor task still owns a handle; the connection closes when it finishes
            Err(_) => Ok(()),
        }
    }
}
