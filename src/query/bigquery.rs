// src/query/bigquery.rs

//! BigQuery REST query runner.
//!
//! Issues a standard-SQL `jobs.query` request, then follows up with
//! `getQueryResults` until the job is complete and every page has been read.
//! Credential acquisition is not handled here: the runner is given a bearer
//! token (or none, for emulators).
//!
//! Row mapping: a column whose name starts with `value` is a measurement keyed
//! by the rest of its name (`value` -> `""`, `value_p95` -> `"_p95"`); every
//! other column is a label. Label keys are sorted so every record of a result
//! set shares one key order.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::errors::{ExporterError, Result};
use crate::query::record::Record;
use crate::query::runner::QueryRunner;

pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Prefix that marks a result column as a measurement.
pub const VALUE_COLUMN_PREFIX: &str = "value";

/// Connection settings for [`BigQueryRunner`].
#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    pub project: String,
    pub endpoint: String,
    pub access_token: Option<String>,
    /// Server-side wait per request (`timeoutMs`).
    pub poll_timeout: Duration,
    /// Upper bound for one whole query, including paging.
    pub deadline: Duration,
}

impl BigQueryConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            poll_timeout: Duration::from_secs(10),
            deadline: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    page_token: Option<String>,
    #[serde(default)]
    job_reference: Option<JobReference>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<TableField>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

/// Production [`QueryRunner`] backed by the BigQuery REST API.
#[derive(Debug, Clone)]
pub struct BigQueryRunner {
    client: reqwest::Client,
    config: BigQueryConfig,
    handle: Handle,
}

impl BigQueryRunner {
    /// `handle` is the runtime used to drive requests from the blocking
    /// `query` entry point.
    pub fn new(config: BigQueryConfig, handle: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bqexporter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            config,
            handle,
        })
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn run(&self, sql: &str) -> Result<Vec<Record>> {
        let url = format!(
            "{}/projects/{}/queries",
            self.config.endpoint, self.config.project
        );
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": self.config.poll_timeout.as_millis() as u64,
        });

        let mut resp: QueryResponse = self
            .authorized(self.client.post(&url).json(&body))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut schema = resp.schema.take();
        let mut job = resp.job_reference.take();
        let mut records = Vec::new();

        loop {
            if resp.job_complete {
                if let Some(schema) = &schema {
                    records.extend(resp.rows.iter().map(|row| row_to_record(&schema.fields, row)));
                }
            }

            let page_token = if resp.job_complete {
                match resp.page_token.take() {
                    Some(token) => Some(token),
                    None => break,
                }
            } else {
                None
            };

            let job_ref = job.as_ref().ok_or_else(|| {
                ExporterError::Other(anyhow::anyhow!(
                    "query response has more results but no job reference"
                ))
            })?;
            trace!(job = %job_ref.job_id, ?page_token, "fetching more query results");

            let mut req = self
                .client
                .get(format!(
                    "{}/projects/{}/queries/{}",
                    self.config.endpoint, job_ref.project_id, job_ref.job_id
                ))
                .query(&[("timeoutMs", self.config.poll_timeout.as_millis().to_string())]);
            if let Some(location) = &job_ref.location {
                req = req.query(&[("location", location)]);
            }
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }

            resp = self
                .authorized(req)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if schema.is_none() {
                schema = resp.schema.take();
            }
            if let Some(next_job) = resp.job_reference.take() {
                job = Some(next_job);
            }
        }

        debug!(rows = records.len(), "query finished");
        Ok(records)
    }
}

impl QueryRunner for BigQueryRunner {
    fn query(&self, query: &str) -> Result<Vec<Record>> {
        let deadline = self.config.deadline;
        self.handle.block_on(async {
            match tokio::time::timeout(deadline, self.run(query)).await {
                Ok(result) => result,
                Err(_) => Err(ExporterError::Other(anyhow::anyhow!(
                    "query did not finish within {:?}",
                    deadline
                ))),
            }
        })
    }
}

fn row_to_record(fields: &[TableField], row: &TableRow) -> Record {
    let mut labels: Vec<(String, String)> = Vec::new();
    let mut values = BTreeMap::new();

    for (field, cell) in fields.iter().zip(row.f.iter()) {
        match field.name.strip_prefix(VALUE_COLUMN_PREFIX) {
            Some(suffix) => match cell_to_f64(&cell.v) {
                Some(v) => {
                    values.insert(suffix.to_string(), v);
                }
                None => debug!(column = %field.name, cell = %cell.v, "skipping non-numeric value"),
            },
            None => labels.push((field.name.clone(), cell_to_label(&cell.v))),
        }
    }

    labels.sort_by(|a, b| a.0.cmp(&b.0));
    let (keys, label_values): (Vec<_>, Vec<_>) = labels.into_iter().unzip();
    Record {
        label_keys: keys,
        label_values,
        values,
    }
}

fn cell_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => match s.as_str() {
            "true" => Some(1.0),
            "false" => Some(0.0),
            other => other.parse().ok(),
        },
        _ => None,
    }
}

fn cell_to_label(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: Value) -> QueryResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn maps_value_columns_and_sorts_labels() {
        let resp = parse(json!({
            "jobComplete": true,
            "schema": {"fields": [
                {"name": "site", "type": "STRING"},
                {"name": "value", "type": "INTEGER"},
                {"name": "machine", "type": "STRING"},
                {"name": "value_p95", "type": "FLOAT"}
            ]},
            "rows": [
                {"f": [{"v": "lga03"}, {"v": "42"}, {"v": "mlab1"}, {"v": "0.5"}]}
            ]
        }));

        let schema = resp.schema.unwrap();
        let record = row_to_record(&schema.fields, &resp.rows[0]);

        assert_eq!(record.label_keys, vec!["machine", "site"]);
        assert_eq!(record.label_values, vec!["mlab1", "lga03"]);
        assert_eq!(record.value(""), Some(42.0));
        assert_eq!(record.value("_p95"), Some(0.5));
    }

    #[test]
    fn null_labels_become_empty_and_null_values_are_skipped() {
        let resp = parse(json!({
            "jobComplete": true,
            "schema": {"fields": [{"name": "site"}, {"name": "value"}, {"name": "value_ok"}]},
            "rows": [{"f": [{"v": null}, {"v": null}, {"v": "true"}]}]
        }));

        let schema = resp.schema.unwrap();
        let record = row_to_record(&schema.fields, &resp.rows[0]);

        assert_eq!(record.label_values, vec![""]);
        assert_eq!(record.value(""), None);
        assert_eq!(record.value("_ok"), Some(1.0));
    }

    #[test]
    fn incomplete_job_response_parses_without_schema() {
        let resp = parse(json!({
            "jobComplete": false,
            "jobReference": {"projectId": "p", "jobId": "job_1", "location": "US"}
        }));
        assert!(!resp.job_complete);
        assert!(resp.rows.is_empty());
        let job = resp.job_reference.unwrap();
        assert_eq!(job.job_id, "job_1");
        assert_eq!(job.location.as_deref(), Some("US"));
    }
}
