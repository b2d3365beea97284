// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid schedule {expr:?}: {reason}")]
    Schedule { expr: String, reason: String },

    #[error("Query for metric {metric:?} failed: {reason}")]
    QueryFailed { metric: String, reason: String },

    #[error("Failed to register collector for {source_name:?}: {reason}")]
    RegisterFailed { source_name: String, reason: String },

    #[error("Failed to unregister collector for {0:?}")]
    UnregisterFailed(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExporterError {
    /// True for failures that leave a source without an active collector
    /// until a later successful reconciliation.
    pub fn is_fatal_for_source(&self) -> bool {
        matches!(self, ExporterError::UnregisterFailed(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExporterError>;
