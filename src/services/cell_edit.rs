use crate::api::middleware::AppError;
use crate::models::{quote_literal, CellEdit, CellEditResult, CellValue};
use crate::services::query_service::QueryService;
use crate::storage::{quote_identifier, LocalStore};
use crate::validation::SqlValidator;

/// Turns an edited result cell back into an UPDATE against the mirrored table
pub struct CellEditor;

impl CellEditor {
    /// Table the edit targets: the explicit name, else the first FROM table of the source query
    pub fn target_table(edit: &CellEdit) -> Result<String, AppError> {
        if let Some(table) = edit.table.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(table.to_string());
        }
        match edit.source_query.as_deref() {
            Some(sql) => SqlValidator::source_table(sql),
            None => Err(AppError::Validation(
                "Cell edit needs a table or a source query".to_string(),
            )),
        }
    }

    /// `UPDATE "t" SET "c" = '<new>' WHERE <every original value matches>;`
    pub fn build_update(table: &str, edit: &CellEdit) -> Result<String, AppError> {
        if edit.column.trim().is_empty() {
            return Err(AppError::Validation("Cell edit has no column".to_string()));
        }
        if edit.row.is_empty() {
            return Err(AppError::Validation(
                "Cell edit has no original row values to identify the row".to_string(),
            ));
        }

        let conditions: Vec<String> = edit
            .row
            .iter()
            .map(|(column, value)| Self::condition(column, value))
            .collect();

        Ok(format!(
            "UPDATE {} SET {} = {} WHERE {};",
            quote_identifier(table),
            quote_identifier(&edit.column),
            quote_literal(&edit.new_value),
            conditions.join(" AND ")
        ))
    }

    fn condition(column: &str, value: &CellValue) -> String {
        match value {
            CellValue::Null => format!("{} IS NULL", quote_identifier(column)),
            other => format!("{} = {}", quote_identifier(column), other.to_sql_literal()),
        }
    }

    /// Apply the edit, then re-run the source query so the caller sees fresh values
    pub fn apply(local: &LocalStore, edit: &CellEdit) -> Result<CellEditResult, AppError> {
        if let Some(sql) = edit.source_query.as_deref() {
            if !SqlValidator::is_select_query(sql) {
                return Err(AppError::Validation(
                    "Cells can only be edited in the result of a SELECT query".to_string(),
                ));
            }
        }

        let table = Self::target_table(edit)?;
        let update_sql = Self::build_update(&table, edit)?;
        tracing::info!("Applying cell edit: {}", update_sql);

        let rows_affected = local
            .execute(&update_sql)
            .map_err(|e| AppError::Query(format!("Cell update failed: {}", e)))?;
        if rows_affected == 0 {
            tracing::warn!("Cell edit on {} matched no rows", table);
        }

        let refreshed = match edit.source_query.as_deref() {
            Some(sql) => Some(QueryService::execute(local, sql)?),
            None => None,
        };

        Ok(CellEditResult {
            update_sql,
            rows_affected,
            refreshed,
        })
    }
}
