// src/query/template.rs

//! Query file loading and token substitution.
//!
//! Query files may reference two tokens which are replaced verbatim before
//! the text reaches a scheduled cache:
//!
//! - `UNIX_START_TIME`: process start time, in Unix seconds.
//! - `REFRESH_RATE_SEC`: the reconciliation interval, in whole seconds.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::fs::FileSystem;

pub const UNIX_START_TIME: &str = "UNIX_START_TIME";
pub const REFRESH_RATE_SEC: &str = "REFRESH_RATE_SEC";

/// Values substituted into every query file.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    fs: Arc<dyn FileSystem>,
    start_time: String,
    refresh_rate: String,
}

impl QueryTemplate {
    pub fn new(fs: Arc<dyn FileSystem>, started_at: DateTime<Utc>, refresh: Duration) -> Self {
        Self {
            fs,
            start_time: started_at.timestamp().to_string(),
            refresh_rate: refresh.as_secs().to_string(),
        }
    }

    /// Replace every template token in `text`.
    pub fn render(&self, text: &str) -> String {
        text.replace(UNIX_START_TIME, &self.start_time)
            .replace(REFRESH_RATE_SEC, &self.refresh_rate)
    }

    /// Read the query file at `path` and render it.
    pub fn load(&self, path: &Path) -> Result<String> {
        let raw = self
            .fs
            .read_to_string(path)
            .with_context(|| format!("loading query template {:?}", path))?;
        Ok(self.render(&raw))
    }
}

/// Metric base name for a query file: the file name without its extension.
///
/// `queries/bq_ndt_tests.sql` becomes `bq_ndt_tests`.
pub fn metric_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use chrono::TimeZone;
    use std::time::SystemTime;

    fn template(fs: MockFileSystem) -> QueryTemplate {
        let started = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        QueryTemplate::new(Arc::new(fs), started, Duration::from_secs(300))
    }

    #[test]
    fn replaces_all_occurrences_of_both_tokens() {
        let t = template(MockFileSystem::new());
        let out = t.render(
            "WHERE ts > UNIX_START_TIME - REFRESH_RATE_SEC AND ts2 > UNIX_START_TIME",
        );
        assert_eq!(
            out,
            "WHERE ts > 1700000000 - 300 AND ts2 > 1700000000"
        );
    }

    #[test]
    fn load_reads_through_the_filesystem() {
        let fs = MockFileSystem::new();
        fs.add_file("q/a.sql", "SELECT REFRESH_RATE_SEC AS value", SystemTime::UNIX_EPOCH);
        let t = template(fs);
        assert_eq!(t.load(Path::new("q/a.sql")).unwrap(), "SELECT 300 AS value");
    }

    #[test]
    fn load_of_missing_file_is_an_error() {
        let t = template(MockFileSystem::new());
        assert!(t.load(Path::new("missing.sql")).is_err());
    }

    #[test]
    fn metric_name_strips_directory_and_extension() {
        assert_eq!(metric_name_for(Path::new("queries/bq_ndt_tests.sql")), "bq_ndt_tests");
        assert_eq!(metric_name_for(Path::new("plain")), "plain");
        assert_eq!(metric_name_for(Path::new("a/b.c.sql")), "b.c");
    }
}
