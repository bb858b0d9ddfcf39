//! A small convenience layer over BigQuery.
//!
//! Formats parameterized SQL templates, estimates query cost via a dry run,
//! executes queries, and moves results between the warehouse, in-memory
//! record batches, local files, and warehouse tables. Everything non-trivial
//! is delegated to the warehouse service itself.
//!
//! The usual flow: build a [`Query`] (optionally from a file, with a
//! parameter mapping), price or validate it against the warehouse, then hand
//! it to a [`Driver`] and call one of the materialization methods.

pub mod bigquery;
pub mod driver;
pub mod errors;
pub mod frame;
pub mod query;
pub mod types;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod testing;

pub use bigquery::BigQueryWarehouse;
pub use driver::{load_dataframe_into_table, load_file_into_table, Driver};
pub use errors::{Result, SlingError};
pub use frame::DataFrame;
pub use query::{Parameters, Query};
pub use types::{
    DryRunStats,
    LoadOptions,
    SourceFormat,
    TableDetails,
    TableRef,
    WriteDisposition,
};
pub use warehouse::Warehouse;
