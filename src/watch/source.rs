// src/watch/source.rs

//! A watched query source and the collector it currently owns.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, error, info, warn};

use crate::collector::{MetricsRegistry, ScheduledCache, UpdateOutcome};
use crate::errors::{ExporterError, Result};
use crate::fs::FileSystem;
use crate::query::metric_name_for;
use crate::types::{UnregisterFailurePolicy, ValueKind};

/// Tracks one query file's modification time and owns the scheduled cache
/// currently registered for it.
///
/// Invariant: if `active` is `Some`, that cache is the one the registry holds
/// for this source.
#[derive(Debug)]
pub struct QuerySource {
    path: PathBuf,
    kind: ValueKind,
    cron: Option<String>,
    policy: UnregisterFailurePolicy,
    last_modified: Option<SystemTime>,
    active: Option<Arc<ScheduledCache>>,
    fs: Arc<dyn FileSystem>,
    registry: Arc<dyn MetricsRegistry>,
}

impl QuerySource {
    pub fn new(
        path: impl Into<PathBuf>,
        kind: ValueKind,
        fs: Arc<dyn FileSystem>,
        registry: Arc<dyn MetricsRegistry>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            cron: None,
            policy: UnregisterFailurePolicy::default(),
            last_modified: None,
            active: None,
            fs,
            registry,
        }
    }

    /// Explicit schedule, preferred over any in-text directive.
    pub fn with_cron(mut self, cron: Option<String>) -> Self {
        self.cron = cron;
        self
    }

    pub fn with_unregister_policy(mut self, policy: UnregisterFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path.display().to_string()
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn cron(&self) -> Option<&str> {
        self.cron.as_deref()
    }

    /// Base metric name derived from the file name.
    pub fn metric_name(&self) -> String {
        metric_name_for(&self.path)
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// The cache currently registered for this source, if any.
    pub fn active(&self) -> Option<&Arc<ScheduledCache>> {
        self.active.as_ref()
    }

    /// Report whether the source changed since the last observation.
    ///
    /// The first successful stat always reports `true`, which is what
    /// bootstraps registration. Afterwards only a strictly newer mtime counts,
    /// and the stored mtime only moves when it does.
    pub fn is_modified(&mut self) -> Result<bool> {
        let current = self.fs.modified(&self.path).map_err(|err| {
            warn!(source = %self.path.display(), %err, "failed to stat query source");
            ExporterError::Other(err)
        })?;

        match self.last_modified {
            None => {
                self.last_modified = Some(current);
                Ok(true)
            }
            Some(previous) => {
                let modified = current > previous;
                debug!(
                    source = %self.path.display(),
                    ?previous,
                    ?current,
                    modified,
                    "checked query source"
                );
                if modified {
                    self.last_modified = Some(current);
                }
                Ok(modified)
            }
        }
    }

    /// Replace the owned cache with `cache`.
    ///
    /// Any previously owned cache is unregistered first. If the registry
    /// refuses, the source is left owning nothing and the failure is fatal
    /// for this source until a later successful reconciliation. Registering
    /// `cache` runs its first query through the registry's describe call.
    pub fn register(&mut self, cache: Arc<ScheduledCache>) -> Result<()> {
        if let Some(previous) = self.active.take() {
            let ok = self.registry.unregister(&previous);
            debug!(source = %self.path.display(), ok, "unregistered previous collector");
            if !ok {
                if self.policy == UnregisterFailurePolicy::ResetTimestamp {
                    self.last_modified = None;
                }
                error!(source = %self.path.display(), policy = ?self.policy, "failed to unregister previous collector");
                return Err(ExporterError::UnregisterFailed(self.name()));
            }
        }

        self.registry.register(Arc::clone(&cache))?;
        info!(
            source = %self.path.display(),
            metric = %cache.metric_name(),
            schedule = %cache.schedule().expression(),
            "registered collector"
        );
        self.active = Some(cache);
        Ok(())
    }

    /// Unregister the owned cache, if any. A source that owns nothing is a
    /// no-op.
    pub fn unregister(&mut self) -> Result<()> {
        let Some(previous) = self.active.take() else {
            return Ok(());
        };
        if self.registry.unregister(&previous) {
            info!(source = %self.path.display(), "unregistered collector");
            Ok(())
        } else {
            Err(ExporterError::UnregisterFailed(self.name()))
        }
    }

    /// Give the owned cache a chance to refresh on its schedule.
    ///
    /// Returns `Ok(None)` if the source owns no cache.
    pub fn update(&self) -> Result<Option<UpdateOutcome>> {
        match &self.active {
            Some(cache) => cache.update().map(Some),
            None => Ok(None),
        }
    }
}
