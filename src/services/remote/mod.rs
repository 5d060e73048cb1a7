// Remote source layer: one adapter per supported driver
pub mod adapter;
#[cfg(test)]
pub mod fake;
pub mod mysql;
pub mod postgresql;
pub mod sqlite;

pub use adapter::{build_select, quote_ansi, select_with_limit, quote_backtick, RemoteRow, RemoteSource, RowCursor};
pub use mysql::MySqlSource;
pub use postgresql::PostgreSqlSource;
pub use sqlite::SqliteSource;

use crate::api::middleware::AppError;

/// Remote driver selected from the connection descriptor's scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    Sqlite,
    PostgreSql,
    MySql,
}

impl RemoteKind {
    pub fn from_descriptor(descriptor: &str) -> Result<Self, AppError> {
        let scheme = descriptor
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| {
                AppError::Connection(format!(
                    "Connection descriptor has no scheme: {}",
                    mask_credentials(descriptor)
                ))
            })?;

        match scheme.as_str() {
            "sqlite" => Ok(RemoteKind::Sqlite),
            "postgresql" | "postgres" => Ok(RemoteKind::PostgreSql),
            "mysql" | "mariadb" => Ok(RemoteKind::MySql),
            other => Err(AppError::Connection(format!(
                "Unsupported remote source type: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteKind::Sqlite => "sqlite",
            RemoteKind::PostgreSql => "postgresql",
            RemoteKind::MySql => "mysql",
        }
    }
}

/// Open a session to the source named by `descriptor`.
///
/// This may block for as long as the driver needs to authenticate.
pub async fn connect(descriptor: &str) -> Result<Box<dyn RemoteSource>, AppError> {
    let kind = RemoteKind::from_descriptor(descriptor)?;
    tracing::info!(
        "Opening {} remote source: {}",
        kind.as_str(),
        mask_credentials(descriptor)
    );

    let source: Box<dyn RemoteSource> = match kind {
        RemoteKind::Sqlite => Box::new(SqliteSource::open(descriptor)?),
        RemoteKind::PostgreSql => Box::new(PostgreSqlSource::connect(descriptor).await?),
        RemoteKind::MySql => Box::new(MySqlSource::connect(descriptor).await?),
    };
    Ok(source)
}

/// Put `password` into a URL-style descriptor, replacing any password already present
pub fn with_password(descriptor: &str, password: &str) -> Result<String, AppError> {
    let mut url = url::Url::parse(descriptor)
        .map_err(|e| AppError::Validation(format!("Invalid remote URL: {}", e)))?;
    url.set_password(Some(password))
        .map_err(|_| AppError::Validation("Remote URL cannot carry credentials".to_string()))?;
    Ok(url.to_string())
}

/// Mask credentials in a descriptor for safe logging
pub fn mask_credentials(descriptor: &str) -> String {
    match url::Url::parse(descriptor) {
        Ok(parsed) => {
            let mut masked = parsed.clone();
            if parsed.password().is_some() {
                let _ = masked.set_password(Some("***"));
            }
            masked.to_string()
        }
        Err(_) => "[unparseable-descriptor]".to_string(),
    }
}
