//! BigQuery implementation of the warehouse seam.
//!
//! Dry runs and table metadata go through `gcp-bigquery-client`. Job
//! insertion with a configured destination and local-file media uploads are
//! not covered by that client, so those requests go to the REST API
//! directly; see the [`rest`] module. Results are read with the record-based
//! API; the Storage read API is a possible future speedup.

mod convert;
mod rest;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::Client as BigQueryClient;
use serde_json::json;
use tracing::debug;

use crate::errors::{Result, SlingError};
use crate::frame::DataFrame;
use crate::types::{DryRunStats, LoadOptions, TableDetails, TableRef};
use crate::warehouse::Warehouse;

pub struct BigQueryWarehouse {
    /// Client for dry runs and table metadata.
    client: BigQueryClient,
    /// Service account key, kept for the direct REST channel.
    gcp_service_account_key_json: String,
    gcp_project_id: String,
    http: reqwest::Client,
}

impl BigQueryWarehouse {
    /// Connect with a service account key.
    ///
    /// The service account should have 'BigQuery Data Editor' and 'BigQuery
    /// Job User' permissions.
    pub async fn connect(
        gcp_service_account_key_json: String,
        gcp_project_id: String,
    ) -> Result<Self> {
        let client = {
            let key = serde_json::from_str(&gcp_service_account_key_json)?;
            BigQueryClient::from_service_account_key(key, false).await?
        };

        Ok(BigQueryWarehouse {
            client,
            gcp_service_account_key_json,
            gcp_project_id,
            http: reqwest::Client::new(),
        })
    }

    /// Connect with a service account key file.
    pub async fn from_key_file(
        path: impl AsRef<Path>,
        gcp_project_id: String,
    ) -> Result<Self> {
        let key_json = tokio::fs::read_to_string(path).await?;
        BigQueryWarehouse::connect(key_json, gcp_project_id).await
    }

    fn resolve_project<'a>(&'a self, table: &'a TableRef) -> &'a str {
        table.project_id.as_deref().unwrap_or(&self.gcp_project_id)
    }

    async fn access_token(&self) -> Result<String> {
        rest::access_token(&self.gcp_service_account_key_json).await
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn dry_run(&self, sql: &str) -> Result<DryRunStats> {
        let mut request = QueryRequest::new(sql);
        request.dry_run = Some(true);
        request.use_query_cache = Some(false);

        let response = self.client.job().query(&self.gcp_project_id, request).await?;
        let bytes = response
            .query_response()
            .total_bytes_processed
            .as_deref()
            .and_then(|b| b.parse::<u64>().ok())
            .ok_or_else(|| {
                SlingError::MalformedResponse(
                    "dry run response missing totalBytesProcessed".to_string(),
                )
            })?;

        debug!(bytes, "dry run completed");
        Ok(DryRunStats {
            total_bytes_billed: bytes,
        })
    }

    async fn execute(&self, sql: &str, destination: Option<&TableRef>) -> Result<DataFrame> {
        let token = self.access_token().await?;

        let mut query_config = json!({
            "query": sql,
            "useLegacySql": false,
        });
        if let Some(dest) = destination {
            query_config["destinationTable"] = json!({
                "projectId": self.resolve_project(dest),
                "datasetId": dest.dataset_id,
                "tableId": dest.table_id,
            });
        }
        let job = json!({ "configuration": { "query": query_config } });

        let inserted =
            rest::insert_job(&self.http, &token, &self.gcp_project_id, &job).await?;
        let (job_id, location) = rest::job_reference(&inserted)?;
        debug!(%job_id, "query job inserted");

        let pages = rest::query_results(
            &self.http,
            &token,
            &self.gcp_project_id,
            &job_id,
            location.as_deref(),
        )
        .await?;
        convert::frame_from_pages(&pages)
    }

    async fn load_file(
        &self,
        path: &Path,
        destination: &TableRef,
        options: &LoadOptions,
    ) -> Result<u64> {
        let token = self.access_token().await?;
        let project = self.resolve_project(destination);

        let job = rest::load_job(destination, project, options);
        let payload = tokio::fs::read(path).await?;

        let inserted = rest::upload_job(&self.http, &token, project, &job, payload).await?;
        let (job_id, location) = rest::job_reference(&inserted)?;
        debug!(%job_id, "load job inserted");

        let done =
            rest::wait_for_job(&self.http, &token, project, &job_id, location.as_deref()).await?;
        Ok(rest::output_rows(&done))
    }

    async fn table_details(&self, table: &TableRef) -> Result<TableDetails> {
        let project = self.resolve_project(table);
        let meta = self
            .client
            .table()
            .get(project, &table.dataset_id, &table.table_id, None)
            .await?;

        Ok(TableDetails {
            created: timestamp_ms(meta.creation_time.as_deref()),
            last_modified: timestamp_ms(meta.last_modified_time.as_deref()),
            num_bytes: meta.num_bytes.as_deref().and_then(|v| v.parse().ok()),
            num_rows: meta.num_rows.as_deref().and_then(|v| v.parse().ok()),
        })
    }

    fn default_project(&self) -> &str {
        &self.gcp_project_id
    }
}

/// Epoch-millisecond strings, the REST encoding for table timestamps.
fn timestamp_ms(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}
