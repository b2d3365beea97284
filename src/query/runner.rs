// src/query/runner.rs

//! Query execution capability.
//!
//! Scheduled caches only see this trait; the production implementation is
//! [`crate::query::bigquery::BigQueryRunner`], and tests provide scripted
//! fakes.

use std::fmt::Debug;

use crate::errors::Result;
use crate::query::record::Record;

/// Runs one query and returns its rows as [`Record`]s.
///
/// Implementations may block on network IO; callers must invoke `query` from
/// a thread where blocking is allowed and never while holding a lock that
/// scrape readers need.
pub trait QueryRunner: Send + Sync + Debug {
    fn query(&self, query: &str) -> Result<Vec<Record>>;
}
