// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{UnregisterFailurePolicy, ValueKind};

pub const DEFAULT_PORT: u16 = 9050;
pub const DEFAULT_REFRESH: &str = "5m";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [exporter]
/// project = "mlab-oti"
/// port = 9050
/// refresh = "5m"
///
/// [[query]]
/// file = "queries/bq_ndt_tests.sql"
/// kind = "gauge"
/// cron = "*/5 * * * *"
/// ```
///
/// All sections are optional; CLI flags can supply or override everything.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub exporter: ExporterSection,

    /// All `[[query]]` entries.
    #[serde(default, rename = "query")]
    pub queries: Vec<QueryConfig>,
}

/// `[exporter]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterSection {
    /// Warehouse project the queries are billed to.
    #[serde(default)]
    pub project: Option<String>,

    /// Port for the `/metrics` endpoint.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Reconciliation interval, e.g. `"30s"`, `"5m"`.
    #[serde(default = "default_refresh")]
    pub refresh: String,

    /// Forget a source's mtime when unregistering its old collector fails,
    /// so the next tick retries registration.
    #[serde(default)]
    pub reset_stat_on_unregister_failure: bool,

    /// Override for the BigQuery REST endpoint (emulators, proxies).
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_refresh() -> String {
    DEFAULT_REFRESH.to_string()
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            project: None,
            port: default_port(),
            refresh: default_refresh(),
            reset_stat_on_unregister_failure: false,
            api_endpoint: None,
        }
    }
}

/// `[[query]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QueryConfig {
    /// Path to the query file.
    pub file: PathBuf,

    /// `"gauge"` or `"counter"`, case-insensitive.
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Optional 5-field cron expression. Takes precedence over a
    /// `--cron-expression=` line inside the query file.
    #[serde(default)]
    pub cron: Option<String>,
}

fn default_kind() -> String {
    "gauge".to_string()
}

impl QueryConfig {
    pub fn new(file: impl Into<PathBuf>, kind: ValueKind) -> Self {
        Self {
            file: file.into(),
            kind: kind.to_string(),
            cron: None,
        }
    }
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>`, so holding one means
/// every query kind and cron expression parsed and the refresh interval is
/// usable.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: Option<String>,
    pub port: u16,
    pub refresh: Duration,
    pub unregister_policy: UnregisterFailurePolicy,
    pub api_endpoint: Option<String>,
    pub queries: Vec<QuerySpec>,
}

/// A validated query source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub file: PathBuf,
    pub kind: ValueKind,
    pub cron: Option<String>,
}
