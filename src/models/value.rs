use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::{BindType, StorageClass};

/// A single cell value moving between the remote source, the local store and callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Storage class the local store will record for this value; `None` for NULL
    pub fn storage_class(&self) -> Option<StorageClass> {
        match self {
            CellValue::Null => None,
            CellValue::Integer(_) => Some(StorageClass::Integer),
            CellValue::Real(_) => Some(StorageClass::Real),
            CellValue::Text(_) => Some(StorageClass::Text),
            CellValue::Blob(_) => Some(StorageClass::Blob),
        }
    }

    /// Convert towards `bind` where a lossless conversion exists.
    ///
    /// Never fails: a value that cannot be converted is returned unchanged and
    /// the local store keeps it with its own storage class.
    pub fn coerce(self, bind: BindType) -> CellValue {
        match (bind, self) {
            (_, CellValue::Null) => CellValue::Null,
            (BindType::Integer, CellValue::Real(f)) if is_integral(f) => CellValue::Integer(f as i64),
            (BindType::Integer, CellValue::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => CellValue::Integer(i),
                Err(_) => CellValue::Text(s),
            },
            (BindType::Real, CellValue::Integer(i)) => CellValue::Real(i as f64),
            (BindType::Real, CellValue::Text(s)) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => CellValue::Real(f),
                _ => CellValue::Text(s),
            },
            (BindType::Boolean, CellValue::Integer(i)) => CellValue::Integer((i != 0) as i64),
            (BindType::Boolean, CellValue::Real(f)) => CellValue::Integer((f != 0.0) as i64),
            // Bit fields arrive as packed bytes
            (BindType::Boolean, CellValue::Blob(bytes)) if !bytes.is_empty() && bytes.len() <= 8 => {
                CellValue::Integer(bytes.iter().any(|b| *b != 0) as i64)
            }
            (BindType::Boolean, CellValue::Text(s)) => match parse_bool(&s) {
                Some(b) => CellValue::Integer(b as i64),
                None => CellValue::Text(s),
            },
            (BindType::Text, CellValue::Integer(i)) => CellValue::Text(i.to_string()),
            (BindType::Text, CellValue::Real(f)) => CellValue::Text(f.to_string()),
            (_, value) => value,
        }
    }

    /// Render as a SQL literal for generated statements
    pub fn to_sql_literal(&self) -> String {
        match self {
            CellValue::Null => "NULL".to_string(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Real(f) if f.is_finite() => format!("{:?}", f),
            CellValue::Real(_) => "NULL".to_string(),
            CellValue::Text(s) => quote_literal(s),
            CellValue::Blob(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2 + 3);
                out.push_str("X'");
                for b in bytes {
                    let _ = write!(out, "{:02X}", b);
                }
                out.push('\'');
                out
            }
        }
    }
}

/// Wrap in single quotes, doubling embedded quotes
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            CellValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            CellValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::Real(f),
            ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
        }
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map(CellValue::Text).unwrap_or(CellValue::Null)
    }
}
