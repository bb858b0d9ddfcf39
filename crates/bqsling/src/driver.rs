//! Query execution and result movement.

use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::errors::Result;
use crate::frame::DataFrame;
use crate::query::Query;
use crate::types::{LoadOptions, SourceFormat, TableDetails, TableRef};
use crate::warehouse::Warehouse;

/// Submits a query for execution and materializes its results.
///
/// Stateless between calls; each method is a fresh round-trip against the
/// held warehouse handle.
pub struct Driver<W> {
    query: Query,
    warehouse: W,
}

impl<W: Warehouse> Driver<W> {
    pub fn new(query: Query, warehouse: W) -> Driver<W> {
        Driver { query, warehouse }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Execute the query and materialize the full result set. When
    /// `destination` is set, results are also persisted to that table.
    pub async fn to_dataframe(&self, destination: Option<&TableRef>) -> Result<DataFrame> {
        self.warehouse.execute(self.query.sql(), destination).await
    }

    /// Execute the query and write the results to a delimited text file at
    /// `path`, using `separator` as the field delimiter.
    pub async fn to_csv(
        &self,
        path: impl AsRef<Path>,
        separator: u8,
        destination: Option<&TableRef>,
    ) -> Result<()> {
        let df = self.to_dataframe(destination).await?;
        df.write_csv(path.as_ref(), separator)
    }

    /// Execute the query with its destination configured to `table`,
    /// blocking until completion. Returns the fully-qualified destination
    /// path.
    pub async fn save_to_table(&self, table: &TableRef) -> Result<String> {
        let df = self.warehouse.execute(self.query.sql(), Some(table)).await?;
        let path = table.qualified(self.warehouse.default_project());
        info!(rows = df.num_rows(), %path, "query results loaded to table");
        Ok(path)
    }

    /// Fetch metadata for a table.
    pub async fn table_details(&self, table: &TableRef) -> Result<TableDetails> {
        self.warehouse.table_details(table).await
    }
}

/// Bulk-load a local file into a table, blocking until the load completes.
/// Returns the number of rows loaded.
pub async fn load_file_into_table<W: Warehouse>(
    warehouse: &W,
    path: impl AsRef<Path>,
    table: &TableRef,
    options: &LoadOptions,
) -> Result<u64> {
    let target = match &options.partition {
        Some(partition) => table.partitioned(partition),
        None => table.clone(),
    };
    let rows = warehouse.load_file(path.as_ref(), &target, options).await?;
    info!(rows, table = %target, "loaded file into table");
    Ok(rows)
}

/// Serialize a frame to a temporary Parquet file and load it into a table.
///
/// The temporary file gets a timestamp-derived name and is left behind
/// after the load.
pub async fn load_dataframe_into_table<W: Warehouse>(
    warehouse: &W,
    df: &DataFrame,
    table: &TableRef,
    options: &LoadOptions,
) -> Result<u64> {
    let path = temp_parquet_path();
    df.write_parquet(&path)?;
    let options = LoadOptions {
        format: SourceFormat::Parquet,
        ..options.clone()
    };
    load_file_into_table(warehouse, &path, table, &options).await
}

fn temp_parquet_path() -> PathBuf {
    let token = Utc::now().format("%y%m%d%H%M%S%f");
    env::temp_dir().join(format!("bqsling-{}.parquet", token))
}
