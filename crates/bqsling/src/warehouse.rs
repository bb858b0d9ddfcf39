//! Seam between the convenience layer and the external warehouse service.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::Result;
use crate::frame::DataFrame;
use crate::types::{DryRunStats, LoadOptions, TableDetails, TableRef};

/// Interface to the external warehouse service.
///
/// Every call is a blocking round-trip; implementations issue one request at
/// a time and add no retries, caching, or timeouts of their own.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Validate the query and estimate its cost without executing it. The
    /// query cache must be bypassed so the estimate reflects a real scan.
    async fn dry_run(&self, sql: &str) -> Result<DryRunStats>;

    /// Execute the query, optionally persisting results into `destination`,
    /// and return the fully materialized result set.
    async fn execute(&self, sql: &str, destination: Option<&TableRef>) -> Result<DataFrame>;

    /// Bulk-load a local file into a table. Returns the number of rows
    /// loaded.
    async fn load_file(
        &self,
        path: &Path,
        destination: &TableRef,
        options: &LoadOptions,
    ) -> Result<u64>;

    /// Fetch table metadata.
    async fn table_details(&self, table: &TableRef) -> Result<TableDetails>;

    /// Project used when a `TableRef` doesn't name one.
    fn default_project(&self) -> &str;
}
