// src/engine/report.rs

use chrono::{DateTime, Utc};

/// What a reconciliation tick did with one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAction {
    /// The file was new or changed and a fresh cache was registered.
    Registered,
    /// The file changed but the swap failed; see the report's errors.
    RegisterFailed,
    /// The owned cache's schedule gate was open and the query ran.
    Refreshed { records: usize },
    /// The owned cache's schedule gate was closed.
    NotDue,
    /// Nothing is registered for this source yet.
    NoCollector,
    /// The owned cache's query failed; it keeps serving the old snapshot.
    UpdateFailed,
}

/// Outcome for one source in one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub action: SourceAction,
    /// Every failure seen for this source during the tick, rendered.
    pub errors: Vec<String>,
}

impl SourceReport {
    pub fn new(source: impl Into<String>, action: SourceAction) -> Self {
        Self {
            source: source.into(),
            action,
            errors: Vec::new(),
        }
    }
}

/// Summary of one pass over all sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl TickReport {
    /// Total failures across all sources.
    pub fn error_count(&self) -> usize {
        self.sources.iter().map(|s| s.errors.len()).sum()
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == name)
    }

    pub fn count(&self, pred: impl Fn(&SourceAction) -> bool) -> usize {
        self.sources.iter().filter(|s| pred(&s.action)).count()
    }
}
