// src/query/mod.rs

//! Query side of the exporter.
//!
//! - [`record`] holds the row type every runner produces.
//! - [`runner`] defines the `QueryRunner` capability scheduled caches call.
//! - [`bigquery`] is the production runner over the BigQuery REST API.
//! - [`template`] loads query files and substitutes template tokens.

pub mod bigquery;
pub mod record;
pub mod runner;
pub mod template;

pub use bigquery::{BigQueryConfig, BigQueryRunner};
pub use record::Record;
pub use runner::QueryRunner;
pub use template::{metric_name_for, QueryTemplate};
