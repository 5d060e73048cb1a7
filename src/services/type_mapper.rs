use crate::models::{BindType, ColumnDescriptor, StorageClass};
use crate::services::remote::RemoteSource;

/// Maps remote column types onto the local store's storage classes
pub struct TypeMapper;

impl TypeMapper {
    /// Map a remote type name to a storage class; case-insensitive, TEXT for anything unknown
    pub fn map_type(remote_type_name: &str) -> StorageClass {
        match Self::classify(remote_type_name) {
            Some(class) => class,
            None => {
                tracing::warn!(
                    "Unmapped remote type '{}', defaulting to TEXT",
                    remote_type_name
                );
                StorageClass::Text
            }
        }
    }

    fn classify(remote_type_name: &str) -> Option<StorageClass> {
        let class = match remote_type_name.trim().to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" | "SMALLINT" | "TINYINT" | "BIGINT" | "COUNTER" => StorageClass::Integer,

            "DECIMAL" | "NUMERIC" | "DOUBLE" | "FLOAT" | "REAL" | "MONEY" | "CURRENCY" => StorageClass::Real,

            "VARCHAR" | "NVARCHAR" | "CHAR" | "NCHAR" | "TEXT" | "NTEXT" | "MEMO" | "STRING" => StorageClass::Text,

            // Stored as ISO-8601 style strings, no timezone normalisation
            "DATE" | "TIME" | "DATETIME" | "TIMESTAMP" => StorageClass::Text,

            "BINARY" | "VARBINARY" | "LONGVARBINARY" | "IMAGE" | "BLOB" => StorageClass::Blob,

            // 0/1
            "BIT" | "BOOLEAN" => StorageClass::Integer,

            _ => return None,
        };
        Some(class)
    }

    fn is_boolean(remote_type_name: &str) -> bool {
        matches!(
            remote_type_name.trim().to_ascii_uppercase().as_str(),
            "BIT" | "BOOLEAN"
        )
    }

    /// Bind type for a column.
    ///
    /// The provider type code is consulted first when the source understands
    /// it; otherwise the name-based storage class decides.
    pub fn bind_type(column: &ColumnDescriptor, remote: Option<&dyn RemoteSource>) -> BindType {
        let hinted = column
            .remote_type_code
            .zip(remote)
            .and_then(|(code, remote)| remote.bind_type_hint(code));

        match hinted {
            Some(bind) => bind,
            None => {
                if let Some(code) = column.remote_type_code {
                    tracing::debug!(
                        "No bind type for provider code {} on column {}, using type name '{}'",
                        code,
                        column.name,
                        column.remote_type_name
                    );
                }
                if Self::is_boolean(&column.remote_type_name) {
                    BindType::Boolean
                } else {
                    Self::classify(&column.remote_type_name)
                        .map(BindType::from)
                        .unwrap_or(BindType::Text)
                }
            }
        }
    }
}
