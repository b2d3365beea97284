// src/engine/reconcile.rs

//! The reconciliation loop.
//!
//! One tick walks every source:
//! - changed (or first seen) → build a fresh cache and swap it in,
//! - otherwise → let the owned cache check its schedule gate.
//!
//! Failures are logged and recorded in the tick report; they never stop the
//! loop. Between ticks the loop sleeps until the next wall-clock instant that
//! is a multiple of the refresh interval.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{until_next_aligned, Clock};
use crate::collector::UpdateOutcome;
use crate::engine::factory::CacheFactory;
use crate::engine::observer::TickObserver;
use crate::engine::report::{SourceAction, SourceReport, TickReport};
use crate::errors::{ExporterError, Result};
use crate::watch::QuerySource;

pub struct Reconciler {
    sources: Vec<QuerySource>,
    factory: CacheFactory,
    refresh: Duration,
    observers: Vec<Box<dyn TickObserver>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("sources", &self.sources.len())
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(sources: Vec<QuerySource>, factory: CacheFactory, refresh: Duration) -> Self {
        Self {
            sources,
            factory,
            refresh,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: impl TickObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn sources(&self) -> &[QuerySource] {
        &self.sources
    }

    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        self.factory.clock()
    }

    /// One synchronous pass over all sources.
    ///
    /// Queries block, so call this from a thread where blocking is allowed
    /// (see [`Self::run`]).
    pub fn tick(&mut self) -> TickReport {
        let started_at = self.clock().now();
        let factory = &self.factory;
        let sources = self
            .sources
            .iter_mut()
            .map(|source| reconcile_source(source, factory))
            .collect();

        let report = TickReport {
            started_at,
            sources,
        };
        debug!(
            registered = report.count(|a| *a == SourceAction::Registered),
            refreshed = report.count(|a| matches!(a, SourceAction::Refreshed { .. })),
            errors = report.error_count(),
            "reconciliation tick finished"
        );
        for observer in self.observers.iter_mut() {
            observer.observe(&report);
        }
        report
    }

    /// Run one tick on the blocking pool and hand `self` back.
    pub async fn tick_blocking(mut self) -> Result<(Self, TickReport)> {
        tokio::task::spawn_blocking(move || {
            let report = self.tick();
            (self, report)
        })
        .await
        .map_err(|e| ExporterError::Other(anyhow::anyhow!("reconciliation tick failed: {e}")))
    }

    /// Tick until `cancel` fires.
    ///
    /// Cancellation is observed between ticks; a query already in flight is
    /// allowed to finish.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!(sources = self.sources.len(), refresh = ?self.refresh, "reconciliation loop started");

        let mut this = self;
        while !cancel.is_cancelled() {
            let (next, _report) = this.tick_blocking().await?;
            this = next;

            let wait = until_next_aligned(this.clock().now(), this.refresh);
            debug!(?wait, "sleeping until next refresh boundary");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("reconciliation loop stopped");
        Ok(())
    }
}

fn reconcile_source(source: &mut QuerySource, factory: &CacheFactory) -> SourceReport {
    let name = source.name();
    let mut errors = Vec::new();

    let modified = match source.is_modified() {
        Ok(modified) => modified,
        Err(err) => {
            errors.push(err.to_string());
            false
        }
    };

    let action = if modified {
        match factory.build(source).and_then(|cache| source.register(Arc::new(cache))) {
            Ok(()) => {
                if source.active().and_then(|c| c.snapshot()).is_none() {
                    errors.push(format!("initial query for {name} produced no snapshot"));
                }
                SourceAction::Registered
            }
            Err(err) => {
                if err.is_fatal_for_source() {
                    warn!(source = %name, %err, "source left without a collector");
                } else {
                    warn!(source = %name, %err, "failed to register collector");
                }
                errors.push(err.to_string());
                SourceAction::RegisterFailed
            }
        }
    } else {
        match source.update() {
            Ok(Some(UpdateOutcome::Refreshed { records })) => SourceAction::Refreshed { records },
            Ok(Some(UpdateOutcome::NotDue { .. })) => SourceAction::NotDue,
            Ok(None) => SourceAction::NoCollector,
            Err(err) => {
                warn!(source = %name, %err, "query failed; serving previous snapshot");
                errors.push(err.to_string());
                SourceAction::UpdateFailed
            }
        }
    };

    SourceReport {
        source: name,
        action,
        errors,
    }
}
