use sqlparser::ast::{ObjectName, ObjectNamePart, SetExpr, Statement, TableFactor};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use crate::api::middleware::AppError;

/// Line separating the queries of a saved query chain
pub const CHAIN_DELIMITER: &str = "--;;--;;--";

/// Statement inspection for the local store's SQL dialect
pub struct SqlValidator;

impl SqlValidator {
    fn parse(sql: &str) -> Result<Vec<Statement>, AppError> {
        let dialect = SQLiteDialect {};
        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| AppError::Validation(format!("SQL parsing error: {}", e)))?;

        if statements.is_empty() {
            return Err(AppError::Validation("Empty SQL query".to_string()));
        }
        Ok(statements)
    }

    /// True when `sql` is a single row-returning query (SELECT, WITH ... SELECT, VALUES).
    ///
    /// SQL the parser does not understand falls back to a keyword check, since
    /// the local store accepts SQLite syntax the parser may not.
    pub fn is_select_query(sql: &str) -> bool {
        match Self::parse(sql) {
            Ok(statements) => {
                statements.len() == 1 && matches!(statements[0], Statement::Query(_))
            }
            Err(_) => {
                let head = sql.trim_start().to_ascii_uppercase();
                head.starts_with("SELECT") || head.starts_with("WITH")
            }
        }
    }

    /// Name of the first table in the FROM clause of a SELECT, unquoted
    pub fn source_table(sql: &str) -> Result<String, AppError> {
        let statements = Self::parse(sql)?;
        let query = match &statements[0] {
            Statement::Query(query) => query,
            other => {
                return Err(AppError::Validation(format!(
                    "Expected a SELECT statement, found: {}",
                    other
                )))
            }
        };

        Self::first_table(&query.body).ok_or_else(|| {
            AppError::Validation("Could not determine the table the query reads from".to_string())
        })
    }

    fn first_table(body: &SetExpr) -> Option<String> {
        match body {
            SetExpr::Select(select) => {
                let from = select.from.first()?;
                match &from.relation {
                    TableFactor::Table { name, .. } => Self::last_identifier(name),
                    _ => None,
                }
            }
            SetExpr::Query(query) => Self::first_table(&query.body),
            SetExpr::SetOperation { left, .. } => Self::first_table(left),
            _ => None,
        }
    }

    // `main.Orders` -> `Orders`
    fn last_identifier(name: &ObjectName) -> Option<String> {
        match name.0.last()? {
            ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Split a query chain script into its queries.
    ///
    /// Queries are separated by a line holding only the delimiter; surrounding
    /// whitespace is trimmed and empty entries dropped.
    pub fn split_query_chain(script: &str) -> Vec<String> {
        let mut queries = Vec::new();
        let mut current = String::new();

        for line in script.lines() {
            if line.trim() == CHAIN_DELIMITER {
                queries.push(std::mem::take(&mut current));
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        queries.push(current);

        queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect()
    }

    /// Join queries into a chain script
    pub fn join_query_chain(queries: &[String]) -> String {
        queries.join(&format!("\n{}\n", CHAIN_DELIMITER))
    }
}
