//! Shared reference and option types for warehouse operations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a warehouse table.
///
/// The project is optional; operations fall back to the client's default
/// project when the reference doesn't carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub project_id: Option<String>,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(dataset_id: impl Into<String>, table_id: impl Into<String>) -> TableRef {
        TableRef {
            project_id: None,
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> TableRef {
        self.project_id = Some(project_id.into());
        self
    }

    /// Copy of this reference addressing a single time-partition
    /// (`table$partition`).
    pub fn partitioned(&self, partition: &str) -> TableRef {
        TableRef {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            table_id: format!("{}${}", self.table_id, partition),
        }
    }

    /// Fully-qualified path, filling in `default_project` when the reference
    /// doesn't name a project.
    pub fn qualified(&self, default_project: &str) -> String {
        let project = self.project_id.as_deref().unwrap_or(default_project);
        format!("{}.{}.{}", project, self.dataset_id, self.table_id)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(project) = &self.project_id {
            write!(f, "{}.", project)?;
        }
        write!(f, "{}.{}", self.dataset_id, self.table_id)
    }
}

/// Source file formats accepted by table loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "CSV",
            SourceFormat::Parquet => "PARQUET",
        }
    }
}

/// Write behavior when the destination table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteDisposition {
    Truncate,
    Append,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::Truncate => "WRITE_TRUNCATE",
            WriteDisposition::Append => "WRITE_APPEND",
        }
    }
}

/// Options controlling a bulk load into a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOptions {
    pub format: SourceFormat,
    /// Number of bad records tolerated before the load fails.
    pub max_bad_records: u32,
    /// Replace (truncate) the destination table instead of appending.
    pub replace: bool,
    /// Partition token to target (`table$partition`).
    pub partition: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> LoadOptions {
        LoadOptions {
            format: SourceFormat::Csv,
            max_bad_records: 0,
            replace: true,
            partition: None,
        }
    }
}

impl LoadOptions {
    pub fn write_disposition(&self) -> WriteDisposition {
        if self.replace {
            WriteDisposition::Truncate
        } else {
            WriteDisposition::Append
        }
    }
}

/// Billed-byte estimate reported by a dry run.
///
/// At dry-run time the service reports the bytes it would scan, which is
/// also what on-demand billing charges for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DryRunStats {
    pub total_bytes_billed: u64,
}

/// Table metadata as reported by the warehouse.
#[derive(Debug, Clone)]
pub struct TableDetails {
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub num_bytes: Option<i64>,
    pub num_rows: Option<u64>,
}
