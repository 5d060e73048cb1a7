use std::collections::HashSet;

use crate::models::{ColumnDescriptor, TableDescriptor};
use crate::services::type_mapper::TypeMapper;
use crate::storage::quote_identifier;

/// Parameterised INSERT targeting a mirrored table
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    /// One entry per column, in column order, including the `:` prefix
    pub parameter_names: Vec<String>,
}

/// Translates remote table descriptions into local-store DDL and DML
pub struct SchemaTranslator;

impl SchemaTranslator {
    /// Build `CREATE TABLE [name] ([col] CLASS NULL, ...)`.
    ///
    /// Returns `None` when no usable column is left, which callers treat as
    /// "skip this table".
    pub fn generate_create_statement(table_name: &str, columns: &[ColumnDescriptor]) -> Option<String> {
        let definitions: Vec<String> = columns
            .iter()
            .filter(|column| {
                let usable = column.is_usable();
                if !usable {
                    tracing::warn!(
                        "Skipping column with missing name or type in table {}",
                        table_name
                    );
                }
                usable
            })
            .map(|column| {
                format!(
                    "  {} {} NULL",
                    quote_identifier(&column.name),
                    TypeMapper::map_type(&column.remote_type_name)
                )
            })
            .collect();

        if definitions.is_empty() {
            tracing::warn!(
                "No valid columns found for table {}, skipping CREATE statement",
                table_name
            );
            return None;
        }

        Some(format!(
            "CREATE TABLE {} (\n{}\n);",
            quote_identifier(table_name),
            definitions.join(",\n")
        ))
    }

    /// Build the INSERT used by the row transfer, one named parameter per column
    pub fn generate_insert_statement(table: &TableDescriptor) -> InsertStatement {
        let mut seen = HashSet::new();
        let parameter_names: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                let base = Self::parameter_name(&column.name);
                let mut candidate = base.clone();
                let mut suffix = 1;
                while !seen.insert(candidate.clone()) {
                    suffix += 1;
                    candidate = format!("{}_{}", base, suffix);
                }
                candidate
            })
            .collect();

        let columns: Vec<String> = table.column_names().map(quote_identifier).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            quote_identifier(&table.name),
            columns.join(", "),
            parameter_names.join(", ")
        );

        InsertStatement {
            sql,
            parameter_names,
        }
    }

    /// `:name` with spaces, hyphens, dots and any other non-identifier
    /// character replaced by `_`
    pub fn parameter_name(column_name: &str) -> String {
        let body: String = column_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        format!(":{}", body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("ID", "INTEGER"),
            ColumnDescriptor::new("Name", "VARCHAR"),
            ColumnDescriptor::new("Created", "DATETIME"),
        ]
    }

    #[test]
    fn test_create_statement_orders() {
        let sql = SchemaTranslator::generate_create_statement("Orders", &orders()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"Orders\" (\n  \"ID\" INTEGER NULL,\n  \"Name\" TEXT NULL,\n  \"Created\" TEXT NULL\n);"
        );
    }

    #[test]
    fn test_create_statement_none_when_no_usable_columns() {
        assert!(SchemaTranslator::generate_create_statement("t", &[]).is_none());
        let unusable = vec![ColumnDescriptor::new("", "INTEGER"), ColumnDescriptor::new("x", "")];
        assert!(SchemaTranslator::generate_create_statement("t", &unusable).is_none());
    }

    #[test]
    fn test_create_statement_one_clause_per_surviving_column_in_order() {
        let columns = vec![
            ColumnDescriptor::new("b", "INT"),
            ColumnDescriptor::new("", "INT"),
            ColumnDescriptor::new("a", "BLOB"),
        ];
        let sql = SchemaTranslator::generate_create_statement("t", &columns).unwrap();
        assert_eq!(sql.matches(" NULL").count(), 2);
        assert!(sql.find("\"b\" INTEGER").unwrap() < sql.find("\"a\" BLOB").unwrap());
    }

    #[test]
    fn test_closing_quote_is_escaped() {
        let columns = vec![ColumnDescriptor::new("we]i\"rd", "TEXT")];
        let sql = SchemaTranslator::generate_create_statement("ta]ble", &columns).unwrap();
        assert!(sql.starts_with("CREATE TABLE \"ta]ble\""));
        assert!(sql.contains("\"we]i\"\"rd\" TEXT NULL"));

        let insert = SchemaTranslator::generate_insert_statement(&TableDescriptor::new("ta]ble", columns));
        assert_eq!(insert.sql, "INSERT INTO \"ta]ble\" (\"we]i\"\"rd\") VALUES (:we_i_rd);");
    }

    #[test]
    fn test_parameter_names() {
        assert_eq!(SchemaTranslator::parameter_name("Order Date"), ":Order_Date");
        assert_eq!(SchemaTranslator::parameter_name("ship-to.zip"), ":ship_to_zip");
    }

    #[test]
    fn test_parameter_names_stay_unique() {
        let table = TableDescriptor::new(
            "t",
            vec![
                ColumnDescriptor::new("a b", "TEXT"),
                ColumnDescriptor::new("a_b", "TEXT"),
                ColumnDescriptor::new("a-b", "TEXT"),
            ],
        );
        let insert = SchemaTranslator::generate_insert_statement(&table);
        assert_eq!(insert.parameter_names, vec![":a_b", ":a_b_2", ":a_b_3"]);
    }

    #[test]
    fn test_create_and_insert_execute_locally() {
        let store = crate::storage::LocalStore::open_in_memory().unwrap();
        let table = TableDescriptor::new(
            "odd]name",
            vec![ColumnDescriptor::new("col]1", "INTEGER"), ColumnDescriptor::new("col 2", "TEXT")],
        );
        let create = SchemaTranslator::generate_create_statement(&table.name, &table.columns).unwrap();
        store.execute(&create).unwrap();

        let insert = SchemaTranslator::generate_insert_statement(&table);
        store
            .insert_row(
                &insert.sql,
                &[crate::models::CellValue::Integer(1), crate::models::CellValue::Text("x".into())],
            )
            .unwrap();
        assert_eq!(store.row_count("odd]name").unwrap(), 1);
    }
}
