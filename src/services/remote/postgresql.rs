// PostgreSQL adapter: a single long-lived client, rows streamed with query_raw
use crate::api::middleware::AppError;
use crate::models::{BindType, CellValue, ColumnDescriptor, RemoteTable};
use crate::services::remote::adapter::{quote_ansi, select_with_limit, RemoteSource, RowCursor};
use futures::StreamExt;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use url::Url;

pub struct PostgreSqlSource {
    client: Client,
}

impl PostgreSqlSource {
    pub async fn connect(connection_url: &str) -> Result<Self, AppError> {
        let url = Url::parse(connection_url)
            .map_err(|e| AppError::Connection(format!("Invalid PostgreSQL URL: {}", e)))?;

        if url.scheme() != "postgresql" && url.scheme() != "postgres" {
            return Err(AppError::Connection(
                "URL must use postgresql:// or postgres:// scheme".to_string(),
            ));
        }

        let (client, connection) = tokio_postgres::connect(connection_url, NoTls)
            .await
            .map_err(|e| AppError::Connection(format!("Failed to connect to PostgreSQL: {}", Self::describe(&e))))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self { client })
    }

    fn describe(e: &tokio_postgres::Error) -> String {
        match e.as_db_error() {
            Some(db_error) => format!(
                "Code: {}, Message: {}",
                db_error.code().code(),
                db_error.message()
            ),
            None => e.to_string(),
        }
    }

    /// Generic type name for a PostgreSQL type, in the vocabulary the type mapper understands
    fn generic_type_name(ty: &Type, typname: &str) -> String {
        let name = match *ty {
            Type::INT2 => "SMALLINT",
            Type::INT4 => "INTEGER",
            Type::INT8 => "BIGINT",
            Type::FLOAT4 => "REAL",
            Type::FLOAT8 => "DOUBLE",
            Type::NUMERIC => "NUMERIC",
            Type::MONEY => "MONEY",
            Type::BOOL => "BOOLEAN",
            Type::VARCHAR => "VARCHAR",
            Type::BPCHAR => "CHAR",
            Type::TEXT | Type::NAME => "TEXT",
            Type::DATE => "DATE",
            Type::TIME | Type::TIMETZ => "TIME",
            Type::TIMESTAMP | Type::TIMESTAMPTZ => "TIMESTAMP",
            Type::BYTEA => "VARBINARY",
            _ => return typname.to_ascii_uppercase(),
        };
        name.to_string()
    }

    /// Types decoded natively from the binary protocol; everything else is selected as text
    fn has_native_decoder(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::BOOL
                | Type::BYTEA
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::DATE
                | Type::TIME
                | Type::TIMESTAMP
        )
    }

    fn select_expression(column: &ColumnDescriptor) -> String {
        let native = column
            .remote_type_code
            .and_then(|code| Type::from_oid(code as u32))
            .map(|ty| Self::has_native_decoder(&ty))
            .unwrap_or(false);

        if native {
            quote_ansi(&column.name)
        } else {
            format!("{}::text", quote_ansi(&column.name))
        }
    }

    fn row_to_cells(row: &Row) -> Result<Vec<CellValue>, tokio_postgres::Error> {
        let mut cells = Vec::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            let cell = match *column.type_() {
                Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| CellValue::Integer(v as i64)),
                Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| CellValue::Integer(v as i64)),
                Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(CellValue::Integer),
                Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(|v| CellValue::Real(v as f64)),
                Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(CellValue::Real),
                Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(|v| CellValue::Integer(v as i64)),
                Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(CellValue::Blob),
                Type::DATE => row
                    .try_get::<_, Option<chrono::NaiveDate>>(idx)?
                    .map(|v| CellValue::Text(v.format("%Y-%m-%d").to_string())),
                Type::TIME => row
                    .try_get::<_, Option<chrono::NaiveTime>>(idx)?
                    .map(|v| CellValue::Text(v.format("%H:%M:%S%.f").to_string())),
                Type::TIMESTAMP => row
                    .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
                    .map(|v| CellValue::Text(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
                _ => row.try_get::<_, Option<String>>(idx)?.map(CellValue::Text),
            };
            cells.push(cell.unwrap_or(CellValue::Null));
        }
        Ok(cells)
    }
}

#[async_trait::async_trait]
impl RemoteSource for PostgreSqlSource {
    fn source_type(&self) -> &str {
        "postgresql"
    }

    async fn list_tables(&self) -> Result<Vec<RemoteTable>, AppError> {
        let rows = self
            .client
            .query(
                r#"
                SELECT table_name::text, table_type::text, table_schema::text
                FROM information_schema.tables
                WHERE table_schema = current_schema()
                   OR table_schema IN ('pg_catalog', 'information_schema')
                ORDER BY table_name
                "#,
                &[],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to get tables: {}", Self::describe(&e))))?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let table_type: String = row.get(1);
                let schema: String = row.get(2);
                let normalized = match table_type.as_str() {
                    _ if schema == "pg_catalog" || schema == "information_schema" => "SYSTEM TABLE",
                    "BASE TABLE" => "TABLE",
                    "VIEW" => "VIEW",
                    other => other,
                };
                RemoteTable::new(name, Some(normalized))
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AppError> {
        let rows = self
            .client
            .query(
                r#"
                SELECT a.attname::text, t.typname::text, a.atttypid
                FROM pg_catalog.pg_attribute a
                JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
                JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                JOIN pg_catalog.pg_type t ON t.oid = a.atttypid
                WHERE c.relname = $1
                  AND n.nspname = current_schema()
                  AND a.attnum > 0
                  AND NOT a.attisdropped
                ORDER BY a.attnum
                "#,
                &[&table],
            )
            .await
            .map_err(|e| AppError::Schema(format!("Failed to get columns for {}: {}", table, Self::describe(&e))))?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let typname: String = row.get(1);
                let oid: u32 = row.get(2);
                let type_name = match Type::from_oid(oid) {
                    Some(ty) => Self::generic_type_name(&ty, &typname),
                    None => typname.to_ascii_uppercase(),
                };
                ColumnDescriptor::new(name, type_name).with_type_code(oid as i32)
            })
            .collect())
    }

    async fn open_cursor(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        row_limit: u64,
    ) -> Result<RowCursor, AppError> {
        let projection: Vec<String> = columns.iter().map(Self::select_expression).collect();
        let sql = select_with_limit(
            format!("SELECT {} FROM {}", projection.join(", "), quote_ansi(table)),
            row_limit,
        );
        tracing::debug!("Opening PostgreSQL cursor: {}", sql);

        let params: Vec<String> = Vec::new();
        let stream = self
            .client
            .query_raw(sql.as_str(), params.iter().map(|p| p as &dyn ToSql))
            .await
            .map_err(|e| AppError::Transfer(format!("Failed to read {}: {}", table, Self::describe(&e))))?;

        let table = table.to_string();
        Ok(stream
            .map(move |row| {
                row.and_then(|row| Self::row_to_cells(&row))
                    .map_err(|e| AppError::Transfer(format!("Failed to read {}: {}", table, Self::describe(&e))))
            })
            .boxed())
    }

    fn bind_type_hint(&self, type_code: i32) -> Option<BindType> {
        let ty = Type::from_oid(type_code as u32)?;
        let bind = match ty {
            Type::INT2 | Type::INT4 | Type::INT8 => BindType::Integer,
            Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => BindType::Real,
            Type::BOOL => BindType::Boolean,
            Type::BYTEA => BindType::Binary,
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => BindType::Text,
            Type::DATE | Type::TIME | Type::TIMESTAMP | Type::TIMESTAMPTZ => BindType::Text,
            _ => return None,
        };
        Some(bind)
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        // Dropping the client ends the spawned connection task
        drop(self.client);
        Ok(())
    }
}
