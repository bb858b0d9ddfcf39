//! SQL templates with dry-run validation and pricing.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::errors::{Result, SlingError};
use crate::types::DryRunStats;
use crate::warehouse::Warehouse;

/// Bytes per tebibyte, the billing unit for on-demand queries.
const TERA_IN_BYTES: f64 = (1u64 << 40) as f64;
/// On-demand price per tebibyte scanned, in USD.
const PRICE_PER_TERA: f64 = 5.0;

/// Named substitution values for query templates. Values are stringified
/// into the template; string values are inserted without quotes.
pub type Parameters = BTreeMap<String, Value>;

/// A SQL query template with its placeholders resolved.
///
/// Double quotes are normalized to single quotes at construction, and every
/// `{name}` placeholder must be covered by the parameter mapping. The
/// dry-run outcome is cached for the lifetime of the instance, so
/// [`Query::validate`] and [`Query::price`] issue at most one request
/// between them.
#[derive(Debug)]
pub struct Query {
    raw: String,
    sql: String,
    parameters: Parameters,
    dry_run: OnceCell<Option<DryRunStats>>,
}

impl Query {
    /// Build a query with no template parameters.
    pub fn new(text: impl Into<String>) -> Result<Query> {
        Query::with_parameters(text, Parameters::new())
    }

    /// Build a query, substituting `{name}` placeholders from `parameters`.
    ///
    /// A template with no placeholders is left unchanged and the mapping is
    /// ignored. Otherwise every placeholder must have a mapping entry;
    /// missing names fail construction with
    /// [`SlingError::MissingParameters`].
    pub fn with_parameters(text: impl Into<String>, parameters: Parameters) -> Result<Query> {
        let raw: String = text.into();
        let normalized = raw.replace('"', "'");
        let names = placeholder_names(&normalized)?;

        let sql = if names.is_empty() {
            normalized
        } else {
            let missing: Vec<String> = names
                .iter()
                .filter(|name| !parameters.contains_key(*name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(SlingError::MissingParameters(missing));
            }
            render(&normalized, &parameters)?
        };

        Ok(Query {
            raw,
            sql,
            parameters,
            dry_run: OnceCell::new(),
        })
    }

    /// Read the template from a file, then defer to
    /// [`Query::with_parameters`].
    pub async fn read_file(path: impl AsRef<Path>, parameters: Parameters) -> Result<Query> {
        let text = tokio::fs::read_to_string(path).await?;
        Query::with_parameters(text, parameters)
    }

    /// The resolved query text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The template text as supplied, before normalization and substitution.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Dry-run the query against the warehouse. Fails with
    /// [`SlingError::InvalidQuery`] if the service rejects the query or the
    /// request cannot be made.
    pub async fn validate<W: Warehouse>(&self, warehouse: &W) -> Result<()> {
        self.dry_run_stats(warehouse).await.map(|_| ())
    }

    /// Estimated on-demand cost of the query in USD, rounded to 3 decimal
    /// places. Uses the same cached dry run as [`Query::validate`].
    pub async fn price<W: Warehouse>(&self, warehouse: &W) -> Result<f64> {
        let stats = self.dry_run_stats(warehouse).await?;
        let price = stats.total_bytes_billed as f64 / TERA_IN_BYTES * PRICE_PER_TERA;
        Ok((price * 1000.0).round() / 1000.0)
    }

    async fn dry_run_stats<W: Warehouse>(&self, warehouse: &W) -> Result<DryRunStats> {
        let outcome = self
            .dry_run
            .get_or_init(|| async {
                debug!("issuing dry run");
                match warehouse.dry_run(&self.sql).await {
                    Ok(stats) => Some(stats),
                    Err(e) => {
                        // Any failure, transport-level included, marks the
                        // query invalid.
                        warn!(%e, "dry run failed");
                        None
                    }
                }
            })
            .await;
        (*outcome).ok_or(SlingError::InvalidQuery)
    }
}

/// Collect placeholder names from a brace-delimited template, in order of
/// first appearance. Doubled braces escape literal braces and are not
/// placeholders.
fn placeholder_names(text: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(SlingError::UnbalancedBraces),
                    }
                }
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    continue;
                }
                return Err(SlingError::UnbalancedBraces);
            }
            _ => {}
        }
    }
    Ok(names)
}

/// Substitute placeholders with their stringified values and collapse
/// escaped braces.
fn render(text: &str, parameters: &Parameters) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(SlingError::UnbalancedBraces),
                    }
                }
                let value = parameters
                    .get(&name)
                    .ok_or_else(|| SlingError::MissingParameters(vec![name.clone()]))?;
                out.push_str(&stringify(value));
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
