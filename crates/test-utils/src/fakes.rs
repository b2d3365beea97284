use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use bqexporter::clock::Clock;
use bqexporter::collector::{MetricsRegistry, ScheduledCache};
use bqexporter::errors::{ExporterError, Result};
use bqexporter::query::{QueryRunner, Record};

type Scripted = std::result::Result<Vec<Record>, String>;

/// A query runner that:
/// - answers from a queue of scripted results, then from a fallback
/// - counts calls and remembers the last query text it saw
/// - optionally sleeps before answering, to stand in for a slow warehouse.
#[derive(Debug)]
pub struct FakeRunner {
    scripted: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Scripted>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::returning(Vec::new())
    }
}

impl FakeRunner {
    /// Always answer with `records` unless something is scripted.
    pub fn returning(records: Vec<Record>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(records)),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    /// Always fail unless something is scripted.
    pub fn failing(reason: &str) -> Self {
        let runner = Self::default();
        runner.set_err(reason);
        runner
    }

    /// Answer the next unscripted call with `records`.
    pub fn push_ok(&self, records: Vec<Record>) {
        self.scripted.lock().push_back(Ok(records));
    }

    /// Fail the next unscripted call.
    pub fn push_err(&self, reason: &str) {
        self.scripted.lock().push_back(Err(reason.to_string()));
    }

    /// Replace the fallback answer.
    pub fn set_ok(&self, records: Vec<Record>) {
        *self.fallback.lock() = Ok(records);
    }

    pub fn set_err(&self, reason: &str) {
        *self.fallback.lock() = Err(reason.to_string());
    }

    /// Sleep this long inside every subsequent query.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().clone()
    }
}

impl QueryRunner for FakeRunner {
    fn query(&self, query: &str) -> Result<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock() = Some(query.to_string());

        let next = self
            .scripted
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        next.map_err(|reason| ExporterError::Other(anyhow!(reason)))
    }
}

/// A registry that behaves like a Prometheus registry where it matters:
/// registering calls `describe()` (which runs the first query), and
/// unregistering something that is not registered reports `false`.
///
/// Either operation can be told to refuse.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    active: Mutex<Vec<Arc<ScheduledCache>>>,
    refuse_register: AtomicBool,
    refuse_unregister: AtomicBool,
    registrations: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_register(&self, refuse: bool) {
        self.refuse_register.store(refuse, Ordering::SeqCst);
    }

    pub fn refuse_unregister(&self, refuse: bool) {
        self.refuse_unregister.store(refuse, Ordering::SeqCst);
    }

    /// Caches currently registered.
    pub fn active(&self) -> Vec<Arc<ScheduledCache>> {
        self.active.lock().clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Successful registrations so far.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self, cache: &Arc<ScheduledCache>) -> bool {
        self.active.lock().iter().any(|c| Arc::ptr_eq(c, cache))
    }
}

impl MetricsRegistry for FakeRegistry {
    fn register(&self, cache: Arc<ScheduledCache>) -> Result<()> {
        if self.refuse_register.load(Ordering::SeqCst) {
            return Err(ExporterError::RegisterFailed {
                source_name: cache.metric_name().to_string(),
                reason: "refused by test".to_string(),
            });
        }
        cache.describe();
        self.active.lock().push(cache);
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unregister(&self, cache: &Arc<ScheduledCache>) -> bool {
        if self.refuse_unregister.load(Ordering::SeqCst) {
            return false;
        }
        let mut active = self.active.lock();
        let before = active.len();
        active.retain(|c| !Arc::ptr_eq(c, cache));
        active.len() != before
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Start at `secs` seconds after the Unix epoch.
    pub fn at_unix(secs: i64) -> Self {
        let now = Utc
            .timestamp_opt(secs, 0)
            .single()
            .expect("timestamp in range");
        Self::new(now)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).expect("duration in range");
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
