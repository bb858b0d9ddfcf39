#[derive(Debug, thiserror::Error)]
pub enum SlingError {
    #[error("Query template is missing parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("Unbalanced braces in query template")]
    UnbalancedBraces,

    #[error("Query is not valid, fix the query before running it")]
    InvalidQuery,

    #[error("Record batch schema does not match frame schema")]
    SchemaMismatch,

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Malformed response from BigQuery: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    BigQueryClient(#[from] gcp_bigquery_client::error::BQError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Failed to use provided service account key: {0}")]
    AuthKey(std::io::Error),

    #[error("Failed to fetch access token: {0}")]
    AuthToken(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to decode json: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
}

pub type Result<T, E = SlingError> = std::result::Result<T, E>;
