use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parameters of one mirror pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorRequest {
    /// Maximum rows copied per table, 0 = unlimited
    #[serde(default)]
    pub row_limit: u64,
    /// Explicit table list; `None` mirrors every table the remote source reports
    #[serde(default)]
    pub table_names: Option<Vec<String>>,
}

impl MirrorRequest {
    pub fn new(row_limit: u64, table_names: Option<Vec<String>>) -> Self {
        Self {
            row_limit,
            table_names,
        }
    }

    pub fn all_tables(row_limit: u64) -> Self {
        Self::new(row_limit, None)
    }
}

/// What happened to a single table during a mirror pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Mirrored { rows: u64 },
    SkippedSchema { reason: String },
    SkippedTransfer { error: String },
}

impl TableOutcome {
    pub fn is_mirrored(&self) -> bool {
        matches!(self, TableOutcome::Mirrored { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

/// Per-table outcomes of one mirror pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorReport {
    pub run_id: String,
    pub row_limit: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tables: Vec<TableReport>,
}

impl MirrorReport {
    pub fn start(row_limit: u64) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            row_limit,
            started_at: Utc::now(),
            finished_at: None,
            tables: Vec::new(),
        }
    }

    pub fn record(&mut self, name: impl Into<String>, outcome: TableOutcome) {
        self.tables.push(TableReport {
            name: name.into(),
            outcome,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn mirrored_count(&self) -> usize {
        self.tables.iter().filter(|t| t.outcome.is_mirrored()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.tables.len() - self.mirrored_count()
    }

    pub fn total_rows(&self) -> u64 {
        self.tables
            .iter()
            .map(|t| match t.outcome {
                TableOutcome::Mirrored { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome_of(&self, table: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.name == table).map(|t| &t.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counters() {
        let mut report = MirrorReport::start(0);
        report.record("a", TableOutcome::Mirrored { rows: 3 });
        report.record("b", TableOutcome::SkippedSchema { reason: "no columns".into() });
        report.record("c", TableOutcome::Mirrored { rows: 2 });
        report.finish();

        assert_eq!(report.mirrored_count(), 2);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.total_rows(), 5);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_outcome_serialization() {
        let report = TableReport {
            name: "Orders".into(),
            outcome: TableOutcome::Mirrored { rows: 2 },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "mirrored");
        assert_eq!(json["rows"], 2);
        assert_eq!(json["name"], "Orders");
    }

    #[test]
    fn test_request_defaults() {
        let request: MirrorRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, MirrorRequest::all_tables(0));
    }
}
