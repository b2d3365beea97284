// src/collector/schedule.rs

//! Cron schedules for scheduled caches.
//!
//! A schedule comes from, in order of preference:
//! 1. an explicit `cron` entry in the structured config,
//! 2. a `--cron-expression=<5-field cron>` line inside the query text,
//! 3. the default, every minute.
//!
//! Resolution takes the caller's notion of "now": a malformed expression, or
//! one with no occurrence after that instant, is logged and replaced by the
//! default. If not even the default compiles, construction fails instead of
//! leaving a broken schedule to blow up on first use.
//!
//! [`Schedule::parse`] only compiles. A compiled schedule that later runs out
//! of occurrences is handled by the cache, which parks its next run at the
//! end of time.

use chrono::{DateTime, Utc};
use croner::Cron;
use tracing::{debug, error};

use crate::errors::{ExporterError, Result};

/// Marker introducing an in-text schedule directive.
pub const CRON_DIRECTIVE: &str = "--cron-expression=";

/// Schedule used when none is given or the given one is unusable.
pub const DEFAULT_CRON: &str = "* * * * *";

/// A compiled, usable 5-field cron schedule.
#[derive(Debug, Clone)]
pub struct Schedule {
    expr: String,
    cron: Cron,
}

impl Schedule {
    /// Compile `expr`.
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let cron = Cron::new(expr)
            .parse()
            .map_err(|e| ExporterError::Schedule {
                expr: expr.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expr: expr.to_string(),
            cron,
        })
    }

    /// Compile `expr`, rejecting it if it has no occurrence after `now`.
    pub fn parse_at(expr: &str, now: DateTime<Utc>) -> Result<Self> {
        let schedule = Self::parse(expr)?;
        if schedule.next_after(now).is_none() {
            return Err(ExporterError::Schedule {
                expr: schedule.expr,
                reason: format!("no occurrence after {now}"),
            });
        }
        Ok(schedule)
    }

    /// The every-minute default.
    pub fn every_minute() -> Result<Self> {
        Self::parse(DEFAULT_CRON)
    }

    /// Schedule embedded in `query`, or the default.
    pub fn from_query_text(query: &str, now: DateTime<Utc>) -> Result<Self> {
        Self::resolve(None, query, now)
    }

    /// Pick the explicit expression if given, else the in-text directive,
    /// else the default. Expressions that do not compile or never fire
    /// after `now` fall back to the default.
    pub fn resolve(explicit: Option<&str>, query: &str, now: DateTime<Utc>) -> Result<Self> {
        let candidate = explicit.or_else(|| directive_in(query));
        match candidate {
            None => Self::every_minute(),
            Some(expr) => match Self::parse_at(expr, now) {
                Ok(schedule) => Ok(schedule),
                Err(err) => {
                    error!(%err, default = DEFAULT_CRON, "unusable cron expression; using default");
                    Self::every_minute()
                }
            },
        }
    }

    /// First occurrence strictly after `t`, or `None` if the schedule is
    /// exhausted.
    pub fn next_after(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.cron.find_next_occurrence(&t, false) {
            Ok(next) => Some(next),
            Err(err) => {
                debug!(expr = %self.expr, %err, "no next occurrence");
                None
            }
        }
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }
}

/// Extract the expression of the first `--cron-expression=` line in `query`.
pub fn directive_in(query: &str) -> Option<&str> {
    query.lines().find_map(|line| {
        line.find(CRON_DIRECTIVE)
            .map(|idx| line[idx + CRON_DIRECTIVE.len()..].trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn directive_is_found_on_its_own_line() {
        let q = "SELECT 1 AS value\n--cron-expression=*/5 * * * *\nFROM t";
        assert_eq!(directive_in(q), Some("*/5 * * * *"));
    }

    #[test]
    fn directive_inside_sql_comment_is_found() {
        let q = "-- --cron-expression=0 3 * * *\nSELECT 1";
        assert_eq!(directive_in(q), Some("0 3 * * *"));
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 3, 20).unwrap()
    }

    #[test]
    fn missing_directive_defaults_to_every_minute() {
        let s = Schedule::from_query_text("SELECT 1", t0()).unwrap();
        assert_eq!(s.expression(), DEFAULT_CRON);
    }

    #[test]
    fn malformed_directive_falls_back_to_default() {
        let s = Schedule::from_query_text("--cron-expression=not a cron\nSELECT 1", t0()).unwrap();
        assert_eq!(s.expression(), DEFAULT_CRON);
    }

    #[test]
    fn explicit_expression_wins_over_directive() {
        let s = Schedule::resolve(Some("0 * * * *"), "--cron-expression=*/5 * * * *", t0()).unwrap();
        assert_eq!(s.expression(), "0 * * * *");
    }

    #[test]
    fn february_thirtieth_compiles_but_never_fires() {
        let s = Schedule::parse("0 0 30 2 *").unwrap();
        assert_eq!(s.next_after(t0()), None);
        assert!(matches!(
            Schedule::parse_at("0 0 30 2 *", t0()),
            Err(ExporterError::Schedule { .. })
        ));

        let resolved = Schedule::resolve(Some("0 0 30 2 *"), "SELECT 1", t0()).unwrap();
        assert_eq!(resolved.expression(), DEFAULT_CRON);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = Schedule::parse("every tuesday").unwrap_err();
        assert!(matches!(err, ExporterError::Schedule { .. }));
    }

    #[test]
    fn five_minute_schedule_steps_on_boundaries() {
        let s = Schedule::parse("*/5 * * * *").unwrap();
        let n1 = s.next_after(t0()).unwrap();
        let n2 = s.next_after(n1).unwrap();
        assert_eq!(n1, Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap());
        assert_eq!(n2, Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap());
    }
}
