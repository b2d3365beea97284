// src/collector/cache.rs

//! The scheduled cache: one query, its cadence, and its last good result.
//!
//! Two paths touch a cache:
//!
//! - the write path, [`ScheduledCache::update`], driven by the single
//!   reconciliation thread. It checks the schedule gate, runs the (slow,
//!   billed) query with no lock held, then swaps in the new snapshot.
//! - the read path, [`ScheduledCache::describe`] / [`ScheduledCache::collect`],
//!   driven by scrapes on arbitrary threads. It clones the snapshot `Arc`
//!   under a short lock and never runs a query. The one exception is the
//!   bootstrap in `describe`, which registries run before they take any
//!   lock of their own.
//!
//! The descriptor catalog is built exactly once, from the first non-empty
//! result. If later results change shape (different label keys or value
//! suffixes), the catalog does not follow: samples keep the first
//! descriptors and a missing suffix exports as `0`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::collector::descriptor::{descriptors_for, Descriptor, Sample};
use crate::collector::schedule::Schedule;
use crate::errors::{ExporterError, Result};
use crate::query::{QueryRunner, Record};
use crate::types::ValueKind;

/// Result of a successful [`ScheduledCache::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The query ran and its rows replaced the snapshot.
    Refreshed { records: usize },
    /// The schedule gate was closed; nothing ran.
    NotDue { next_run: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy)]
struct RunTimes {
    last_run: DateTime<Utc>,
    next_run: DateTime<Utc>,
}

pub struct ScheduledCache {
    runner: Arc<dyn QueryRunner>,
    clock: Arc<dyn Clock>,
    kind: ValueKind,
    metric_name: String,
    query: String,
    schedule: Schedule,
    times: Mutex<RunTimes>,
    descriptors: OnceLock<Vec<Arc<Descriptor>>>,
    /// `None` until the first successful query. While this is `None` or
    /// holds no records the schedule gate is bypassed.
    snapshot: Mutex<Option<Arc<Vec<Record>>>>,
}

impl fmt::Debug for ScheduledCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledCache")
            .field("metric_name", &self.metric_name)
            .field("kind", &self.kind)
            .field("schedule", &self.schedule.expression())
            .field("times", &*self.times.lock())
            .finish_non_exhaustive()
    }
}

impl ScheduledCache {
    /// Create a cache on the system clock, taking the schedule from a
    /// `--cron-expression=` directive in `query` (default: every minute).
    pub fn new(
        runner: Arc<dyn QueryRunner>,
        kind: ValueKind,
        metric_name: impl Into<String>,
        query: impl Into<String>,
    ) -> Result<Self> {
        Self::with_clock(runner, Arc::new(SystemClock), kind, metric_name, query)
    }

    /// Like [`Self::new`] with an explicit clock.
    pub fn with_clock(
        runner: Arc<dyn QueryRunner>,
        clock: Arc<dyn Clock>,
        kind: ValueKind,
        metric_name: impl Into<String>,
        query: impl Into<String>,
    ) -> Result<Self> {
        let query = query.into();
        let schedule = Schedule::from_query_text(&query, clock.now())?;
        Ok(Self::with_schedule(runner, clock, kind, metric_name, query, schedule))
    }

    /// Create a cache with an already-resolved schedule.
    pub fn with_schedule(
        runner: Arc<dyn QueryRunner>,
        clock: Arc<dyn Clock>,
        kind: ValueKind,
        metric_name: impl Into<String>,
        query: impl Into<String>,
        schedule: Schedule,
    ) -> Self {
        let metric_name = metric_name.into();
        let now = clock.now();
        let next_run = next_run_after(&schedule, &metric_name, now);
        debug!(metric = %metric_name, schedule = %schedule.expression(), %next_run, "scheduled cache created");

        Self {
            runner,
            clock,
            kind,
            metric_name,
            query: query.into(),
            schedule,
            times: Mutex::new(RunTimes {
                last_run: now,
                next_run,
            }),
            descriptors: OnceLock::new(),
            snapshot: Mutex::new(None),
        }
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn last_run(&self) -> DateTime<Utc> {
        self.times.lock().last_run
    }

    pub fn next_run(&self) -> DateTime<Utc> {
        self.times.lock().next_run
    }

    /// Current snapshot, or `None` before the first successful query.
    pub fn snapshot(&self) -> Option<Arc<Vec<Record>>> {
        self.snapshot.lock().clone()
    }

    /// Descriptor catalog, running the query once first if the catalog has
    /// not been built yet.
    ///
    /// Registries call this on registration, which is what triggers the
    /// first query of a freshly registered cache. It must not be called
    /// while holding a lock that scrapes need.
    pub fn describe(&self) -> Vec<Arc<Descriptor>> {
        if let Some(catalog) = self.descriptors.get() {
            return catalog.clone();
        }

        if let Err(err) = self.update() {
            warn!(metric = %self.metric_name, %err, "initial query failed");
        }

        self.catalog().map(<[_]>::to_vec).unwrap_or_default()
    }

    /// The catalog as built so far. Never runs a query.
    pub fn descriptors(&self) -> Vec<Arc<Descriptor>> {
        self.catalog().map(<[_]>::to_vec).unwrap_or_default()
    }

    /// Samples from the cached snapshot: one per record per descriptor.
    ///
    /// Never runs a query.
    pub fn collect(&self) -> Vec<Sample> {
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        let Some(catalog) = self.catalog() else {
            return Vec::new();
        };

        let mut samples = Vec::with_capacity(snapshot.len() * catalog.len());
        for record in snapshot.iter() {
            for descriptor in catalog {
                let value = record.value(&descriptor.suffix).unwrap_or_else(|| {
                    debug!(metric = %descriptor.name, "record has no value for suffix; exporting 0");
                    0.0
                });
                samples.push(Sample {
                    descriptor: Arc::clone(descriptor),
                    kind: self.kind,
                    value,
                    label_values: record.label_values.clone(),
                });
            }
        }
        samples
    }

    /// Run the query if the schedule gate is open (or no rows have been
    /// fetched yet) and swap in the result.
    ///
    /// The next run time advances before the query executes, so a failing
    /// query is retried at the next scheduled slot rather than on every call.
    /// On failure the previous snapshot stays in place.
    pub fn update(&self) -> Result<UpdateOutcome> {
        let now = self.clock.now();
        let bootstrap = self.snapshot.lock().as_ref().is_none_or(|s| s.is_empty());

        {
            let mut times = self.times.lock();
            if now < times.next_run && !bootstrap {
                debug!(metric = %self.metric_name, next_run = %times.next_run, "schedule time not reached");
                return Ok(UpdateOutcome::NotDue {
                    next_run: times.next_run,
                });
            }
            times.last_run = now;
            times.next_run = next_run_after(&self.schedule, &self.metric_name, now);
        }

        debug!(metric = %self.metric_name, bootstrap, "running query");
        let records = self
            .runner
            .query(&self.query)
            .map_err(|err| ExporterError::QueryFailed {
                metric: self.metric_name.clone(),
                reason: err.to_string(),
            })?;

        let count = records.len();
        *self.snapshot.lock() = Some(Arc::new(records));
        debug!(metric = %self.metric_name, records = count, "snapshot replaced");

        Ok(UpdateOutcome::Refreshed { records: count })
    }

    /// The catalog, building it from the current snapshot if that snapshot
    /// has at least one record.
    fn catalog(&self) -> Option<&[Arc<Descriptor>]> {
        if let Some(catalog) = self.descriptors.get() {
            return Some(catalog);
        }
        let snapshot = self.snapshot()?;
        let shape = snapshot.first()?;
        let catalog = self
            .descriptors
            .get_or_init(|| descriptors_for(&self.metric_name, shape));
        Some(catalog)
    }
}

fn next_run_after(schedule: &Schedule, metric_name: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    schedule.next_after(now).unwrap_or_else(|| {
        warn!(metric = %metric_name, schedule = %schedule.expression(), "schedule exhausted; query will not run again");
        DateTime::<Utc>::MAX_UTC
    })
}
