//! Direct REST calls for the job endpoints the client crate doesn't cover.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{Result, SlingError};
use crate::types::{LoadOptions, SourceFormat, TableRef};

const BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const UPLOAD_URL: &str = "https://bigquery.googleapis.com/upload/bigquery/v2";
const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Fetch an OAuth2 access token for the service account key.
pub(crate) async fn access_token(key_json: &str) -> Result<String> {
    let key = yup_oauth2::parse_service_account_key(key_json).map_err(SlingError::AuthKey)?;
    let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .map_err(SlingError::AuthKey)?;
    let token = auth
        .token(&[BIGQUERY_SCOPE])
        .await
        .map_err(|e| SlingError::AuthToken(e.to_string()))?;
    token
        .token()
        .map(|t| t.to_string())
        .ok_or_else(|| SlingError::AuthToken("token response carried no access token".to_string()))
}

/// Build the job document for a bulk load.
pub(crate) fn load_job(destination: &TableRef, project: &str, options: &LoadOptions) -> Value {
    let mut load = json!({
        "destinationTable": {
            "projectId": project,
            "datasetId": destination.dataset_id,
            "tableId": destination.table_id,
        },
        "sourceFormat": options.format.as_str(),
        "writeDisposition": options.write_disposition().as_str(),
        "maxBadRecords": options.max_bad_records,
        "autodetect": true,
    });
    if options.format == SourceFormat::Csv {
        // First row is the header.
        load["skipLeadingRows"] = json!(1);
    }
    json!({ "configuration": { "load": load } })
}

/// Submit a job with no payload.
pub(crate) async fn insert_job(
    http: &reqwest::Client,
    token: &str,
    project: &str,
    job: &Value,
) -> Result<Value> {
    let url = format!("{}/projects/{}/jobs", BASE_URL, project);
    let response = http.post(&url).bearer_auth(token).json(job).send().await?;
    Ok(response.error_for_status()?.json().await?)
}

/// Submit a load job together with its file payload as a single
/// multipart/related request.
pub(crate) async fn upload_job(
    http: &reqwest::Client,
    token: &str,
    project: &str,
    job: &Value,
    payload: Vec<u8>,
) -> Result<Value> {
    let url = format!("{}/projects/{}/jobs?uploadType=multipart", UPLOAD_URL, project);
    let boundary = Uuid::new_v4().simple().to_string();
    let body = multipart_related(&boundary, job, payload)?;

    let response = http
        .post(&url)
        .bearer_auth(token)
        .header(
            reqwest::header::CONTENT_TYPE,
            format!("multipart/related; boundary={}", boundary),
        )
        .body(body)
        .send()
        .await?;
    Ok(response.error_for_status()?.json().await?)
}

fn multipart_related(boundary: &str, job: &Value, payload: Vec<u8>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n",
            boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(&serde_json::to_vec(job)?);
    body.extend_from_slice(
        format!(
            "\r\n--{}\r\nContent-Type: application/octet-stream\r\n\r\n",
            boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(&payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Ok(body)
}

/// Job id and location from an inserted job.
pub(crate) fn job_reference(job: &Value) -> Result<(String, Option<String>)> {
    let reference = &job["jobReference"];
    let job_id = reference["jobId"]
        .as_str()
        .ok_or_else(|| {
            SlingError::MalformedResponse("job response missing jobReference.jobId".to_string())
        })?
        .to_string();
    let location = reference["location"].as_str().map(|s| s.to_string());
    Ok((job_id, location))
}

/// Poll a job until it reaches a terminal state. Fails if the job finished
/// with an error.
pub(crate) async fn wait_for_job(
    http: &reqwest::Client,
    token: &str,
    project: &str,
    job_id: &str,
    location: Option<&str>,
) -> Result<Value> {
    let url = format!("{}/projects/{}/jobs/{}", BASE_URL, project, job_id);
    loop {
        let mut request = http.get(&url).bearer_auth(token);
        if let Some(location) = location {
            request = request.query(&[("location", location)]);
        }
        let job: Value = request.send().await?.error_for_status()?.json().await?;

        match job["status"]["state"].as_str() {
            Some("DONE") => {
                if let Some(message) = job["status"]["errorResult"]["message"].as_str() {
                    return Err(SlingError::JobFailed(message.to_string()));
                }
                return Ok(job);
            }
            state => {
                debug!(job_id, ?state, "waiting for job");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

/// Rows written by a completed load job.
pub(crate) fn output_rows(job: &Value) -> u64 {
    job["statistics"]["load"]["outputRows"]
        .as_str()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Fetch every result page for a query job, waiting for the job to complete
/// if it hasn't yet.
pub(crate) async fn query_results(
    http: &reqwest::Client,
    token: &str,
    project: &str,
    job_id: &str,
    location: Option<&str>,
) -> Result<Vec<Value>> {
    let url = format!("{}/projects/{}/queries/{}", BASE_URL, project, job_id);
    let mut pages = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(location) = location {
            params.push(("location", location));
        }
        if let Some(page_token) = page_token.as_deref() {
            params.push(("pageToken", page_token));
        }

        let page: Value = http
            .get(&url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if page["jobComplete"].as_bool() == Some(false) {
            debug!(job_id, "query job still running");
            tokio::time::sleep(POLL_INTERVAL).await;
            continue;
        }

        page_token = page["pageToken"].as_str().map(|s| s.to_string());
        pages.push(page);
        if page_token.is_none() {
            return Ok(pages);
        }
    }
}
