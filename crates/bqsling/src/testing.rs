//! Scripted warehouse used by in-module tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use crate::errors::{Result, SlingError};
use crate::frame::DataFrame;
use crate::types::{DryRunStats, LoadOptions, TableDetails, TableRef};
use crate::warehouse::Warehouse;

#[derive(Debug, Clone)]
pub struct RecordedExecute {
    pub sql: String,
    pub destination: Option<TableRef>,
}

#[derive(Debug, Clone)]
pub struct RecordedLoad {
    pub path: PathBuf,
    pub destination: TableRef,
    pub options: LoadOptions,
}

pub struct MockWarehouse {
    /// `None` makes every dry run fail.
    dry_run_bytes: Option<u64>,
    dry_runs: AtomicUsize,
    executes: Mutex<Vec<RecordedExecute>>,
    loads: Mutex<Vec<RecordedLoad>>,
    load_rows: u64,
}

impl MockWarehouse {
    pub fn with_dry_run_bytes(bytes: u64) -> MockWarehouse {
        MockWarehouse {
            dry_run_bytes: Some(bytes),
            dry_runs: AtomicUsize::new(0),
            executes: Mutex::new(Vec::new()),
            loads: Mutex::new(Vec::new()),
            load_rows: 0,
        }
    }

    pub fn failing_dry_run() -> MockWarehouse {
        MockWarehouse {
            dry_run_bytes: None,
            ..MockWarehouse::with_dry_run_bytes(0)
        }
    }

    pub fn with_load_rows(mut self, rows: u64) -> MockWarehouse {
        self.load_rows = rows;
        self
    }

    pub fn dry_run_count(&self) -> usize {
        self.dry_runs.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> Vec<RecordedExecute> {
        self.executes.lock().unwrap().clone()
    }

    pub fn loads(&self) -> Vec<RecordedLoad> {
        self.loads.lock().unwrap().clone()
    }

    /// Two rows over an `(id, name)` schema.
    pub fn sample_frame() -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(2)])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("a"), Some("b")])) as ArrayRef,
            ],
        )
        .unwrap();
        DataFrame::try_new(schema, vec![batch]).unwrap()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn dry_run(&self, _sql: &str) -> Result<DryRunStats> {
        self.dry_runs.fetch_add(1, Ordering::SeqCst);
        match self.dry_run_bytes {
            Some(bytes) => Ok(DryRunStats {
                total_bytes_billed: bytes,
            }),
            None => Err(SlingError::JobFailed("dry run rejected".to_string())),
        }
    }

    async fn execute(&self, sql: &str, destination: Option<&TableRef>) -> Result<DataFrame> {
        self.executes.lock().unwrap().push(RecordedExecute {
            sql: sql.to_string(),
            destination: destination.cloned(),
        });
        Ok(MockWarehouse::sample_frame())
    }

    async fn load_file(
        &self,
        path: &Path,
        destination: &TableRef,
        options: &LoadOptions,
    ) -> Result<u64> {
        self.loads.lock().unwrap().push(RecordedLoad {
            path: path.to_path_buf(),
            destination: destination.clone(),
            options: options.clone(),
        });
        Ok(self.load_rows)
    }

    async fn table_details(&self, _table: &TableRef) -> Result<TableDetails> {
        Ok(TableDetails {
            created: None,
            last_modified: None,
            num_bytes: Some(1024),
            num_rows: Some(2),
        })
    }

    fn default_project(&self) -> &str {
        "test-project"
    }
}
