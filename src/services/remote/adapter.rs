// Remote source trait - the boundary to the system being mirrored
use crate::api::middleware::AppError;
use crate::models::{BindType, CellValue, ColumnDescriptor, RemoteTable};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

/// One row as read from the remote source, in SELECT column order
pub type RemoteRow = Vec<CellValue>;

/// Forward-only cursor over a remote SELECT.
///
/// Dropping the cursor stops the producer, so nothing beyond the rows already
/// pulled is fetched.
pub type RowCursor = BoxStream<'static, Result<RemoteRow, AppError>>;

/// Rows buffered between a producer thread/task and the consumer
pub(crate) const CURSOR_BUFFER: usize = 256;

/// Build a cursor fed through a bounded channel
pub(crate) fn channel_cursor() -> (mpsc::Sender<Result<RemoteRow, AppError>>, RowCursor) {
    let (tx, rx) = mpsc::channel(CURSOR_BUFFER);
    let cursor = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed();
    (tx, cursor)
}

/// Remote source - abstraction over the different drivers a mirror can read from
#[async_trait::async_trait]
pub trait RemoteSource: Send + Sync {
    /// Short name of the driver, e.g. "postgresql"
    fn source_type(&self) -> &str;

    /// Every catalog entry with its normalised type
    async fn list_tables(&self) -> Result<Vec<RemoteTable>, AppError>;

    /// Raw column descriptors in ordinal order; unusable entries are filtered by the caller
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AppError>;

    /// Open a forward-only cursor selecting `columns` from `table`.
    ///
    /// A non-zero `row_limit` is pushed down to the remote query, so the source
    /// never reads more than that many rows.
    async fn open_cursor(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        row_limit: u64,
    ) -> Result<RowCursor, AppError>;

    /// Bind type for a provider-specific type code, if the source knows it
    fn bind_type_hint(&self, _type_code: i32) -> Option<BindType> {
        None
    }

    /// Release the session
    async fn close(self: Box<Self>) -> Result<(), AppError>;
}

/// Quote an identifier with double quotes, doubling embedded quotes
pub fn quote_ansi(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_backtick(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `SELECT <cols> FROM <table> [LIMIT k]` using the remote dialect's quoting
pub fn build_select<F>(table: &str, columns: &[ColumnDescriptor], row_limit: u64, quote: F) -> String
where
    F: Fn(&str) -> String,
{
    let projection: Vec<String> = columns.iter().map(|c| quote(&c.name)).collect();
    select_with_limit(format!("SELECT {} FROM {}", projection.join(", "), quote(table)), row_limit)
}

/// Append `LIMIT k` when `row_limit` caps the read; 0 means unlimited
pub fn select_with_limit(sql: String, row_limit: u64) -> String {
    if row_limit > 0 {
        format!("{} LIMIT {}", sql, row_limit)
    } else {
        sql
    }
}

/// Render a byte string as text when it is valid UTF-8, otherwise keep it binary
pub(crate) fn bytes_to_cell(bytes: Vec<u8>) -> CellValue {
    match String::from_utf8(bytes) {
        Ok(s) => CellValue::Text(s),
        Err(e) => CellValue::Blob(e.into_bytes()),
    }
}
