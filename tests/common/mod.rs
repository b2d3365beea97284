#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeZone, Utc};

use bqexporter::clock::Clock;
use bqexporter::collector::MetricsRegistry;
use bqexporter::engine::{CacheFactory, Reconciler};
use bqexporter::fs::mock::MockFileSystem;
use bqexporter::fs::FileSystem;
use bqexporter::query::QueryTemplate;
use bqexporter::types::ValueKind;
use bqexporter::watch::QuerySource;

pub use bqexporter_test_utils::builders;
pub use bqexporter_test_utils::{init_tracing, with_timeout, FakeRegistry, FakeRunner, ManualClock};

/// 2024-01-01T12:01:30Z: inside a minute, not on a boundary.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 30).unwrap()
}

/// mtime given to freshly written query files.
pub fn initial_mtime() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_000)
}

/// Everything a source watcher or reconciler needs, all of it fake.
pub struct Harness {
    pub fs: MockFileSystem,
    pub runner: Arc<FakeRunner>,
    pub registry: Arc<FakeRegistry>,
    pub clock: Arc<ManualClock>,
    pub refresh: Duration,
}

impl Harness {
    pub fn new(runner: FakeRunner) -> Self {
        Self {
            fs: MockFileSystem::new(),
            runner: Arc::new(runner),
            registry: Arc::new(FakeRegistry::new()),
            clock: Arc::new(ManualClock::new(start_time())),
            refresh: Duration::from_secs(60),
        }
    }

    pub fn write_query(&self, path: &str, text: &str) {
        self.fs.add_file(path, text, initial_mtime());
    }

    /// Rewrite a query file and bump its mtime by one second.
    pub fn edit_query(&self, path: &str, text: &str) {
        self.fs.touch(path, text, Duration::from_secs(1));
    }

    pub fn template(&self) -> QueryTemplate {
        let fs: Arc<dyn FileSystem> = Arc::new(self.fs.clone());
        QueryTemplate::new(fs, start_time(), self.refresh)
    }

    pub fn factory(&self) -> CacheFactory {
        let clock: Arc<dyn Clock> = self.clock.clone();
        CacheFactory::new(self.runner.clone(), clock, self.template())
    }

    pub fn source(&self, path: &str, kind: ValueKind) -> QuerySource {
        let fs: Arc<dyn FileSystem> = Arc::new(self.fs.clone());
        let registry: Arc<dyn MetricsRegistry> = self.registry.clone();
        QuerySource::new(path, kind, fs, registry)
    }

    pub fn reconciler(&self, gauges: &[&str]) -> Reconciler {
        let sources = gauges
            .iter()
            .map(|path| self.source(path, ValueKind::Gauge))
            .collect();
        Reconciler::new(sources, self.factory(), self.refresh)
    }
}
