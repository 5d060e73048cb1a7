use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse value type of the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageClass {
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Integer => "INTEGER",
            StorageClass::Real => "REAL",
            StorageClass::Text => "TEXT",
            StorageClass::Blob => "BLOB",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native type a remote value is coerced to before it is bound to the INSERT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindType {
    Integer,
    Real,
    Boolean,
    Text,
    Binary,
}

impl From<StorageClass> for BindType {
    fn from(class: StorageClass) -> Self {
        match class {
            StorageClass::Integer => BindType::Integer,
            StorageClass::Real => BindType::Real,
            StorageClass::Text => BindType::Text,
            StorageClass::Blob => BindType::Binary,
        }
    }
}

/// One column as reported by the remote source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub remote_type_name: String,
    /// Provider-specific type tag, e.g. a PostgreSQL type OID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_type_code: Option<i32>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, remote_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_type_name: remote_type_name.into(),
            remote_type_code: None,
        }
    }

    pub fn with_type_code(mut self, code: i32) -> Self {
        self.remote_type_code = Some(code);
        self
    }

    /// Columns without a name or a type name cannot be mirrored
    pub fn is_usable(&self) -> bool {
        !self.name.trim().is_empty() && !self.remote_type_name.trim().is_empty()
    }
}

/// A remote table and the columns that survived filtering.
///
/// Both the CREATE statement and the INSERT/SELECT pair are built from the
/// same descriptor so their column order always agrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        let name = name.into();
        let columns = columns
            .into_iter()
            .filter(|column| {
                let usable = column.is_usable();
                if !usable {
                    tracing::warn!(
                        "Skipping column with missing name or type in table {}: {:?}",
                        name,
                        column
                    );
                }
                usable
            })
            .collect();

        Self { name, columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Entry of the remote catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTable {
    pub name: String,
    /// Normalised to `TABLE`, `VIEW` or `SYSTEM TABLE` when the source reports a type
    pub table_type: Option<String>,
}

impl RemoteTable {
    pub fn new(name: impl Into<String>, table_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            table_type: table_type.map(str::to_string),
        }
    }

    /// Plain tables and entries of unknown type are mirrored; views and system tables are not
    pub fn is_mirrorable(&self) -> bool {
        if self.name.is_empty() {
            return false;
        }
        match self.table_type.as_deref() {
            None | Some("") => true,
            Some(t) => t.eq_ignore_ascii_case("TABLE"),
        }
    }
}
