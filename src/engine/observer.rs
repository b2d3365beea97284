// src/engine/observer.rs

//! Hooks that see every tick report.

use std::fmt::Debug;

use prometheus::{IntCounter, IntGauge, Registry};
use tracing::info;

use crate::engine::report::TickReport;
use crate::errors::Result;

/// Called by the reconciler after every tick.
pub trait TickObserver: Send + Debug {
    fn observe(&mut self, report: &TickReport);
}

/// Publishes reconciliation failure counts as metrics.
///
/// - `bqexporter_reconcile_errors`: failures in the most recent tick.
/// - `bqexporter_reconcile_errors_total`: failures since start.
#[derive(Debug, Clone)]
pub struct ErrorCountObserver {
    last_tick: IntGauge,
    total: IntCounter,
}

impl ErrorCountObserver {
    pub fn register(registry: &Registry) -> Result<Self> {
        let last_tick = IntGauge::new(
            "bqexporter_reconcile_errors",
            "Failures seen during the most recent reconciliation tick",
        )?;
        let total = IntCounter::new(
            "bqexporter_reconcile_errors_total",
            "Failures seen across all reconciliation ticks",
        )?;
        registry.register(Box::new(last_tick.clone()))?;
        registry.register(Box::new(total.clone()))?;
        Ok(Self { last_tick, total })
    }

    pub fn last_tick(&self) -> i64 {
        self.last_tick.get()
    }

    pub fn total(&self) -> u64 {
        self.total.get()
    }
}

impl TickObserver for ErrorCountObserver {
    fn observe(&mut self, report: &TickReport) {
        let errors = report.error_count();
        self.last_tick.set(errors as i64);
        self.total.inc_by(errors as u64);
        if errors > 0 {
            info!(errors, "reconciliation tick finished with errors");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::report::{SourceAction, SourceReport};
    use chrono::Utc;

    fn report_with_errors(n: usize) -> TickReport {
        let mut source = SourceReport::new("q.sql", SourceAction::UpdateFailed);
        source.errors = (0..n).map(|i| format!("boom {i}")).collect();
        TickReport {
            started_at: Utc::now(),
            sources: vec![source],
        }
    }

    #[test]
    fn counts_errors_per_tick_and_in_total() {
        let registry = Registry::new();
        let mut observer = ErrorCountObserver::register(&registry).unwrap();

        observer.observe(&report_with_errors(2));
        observer.observe(&report_with_errors(0));
        observer.observe(&report_with_errors(3));

        assert_eq!(observer.last_tick(), 3);
        assert_eq!(observer.total(), 5);
    }

    #[test]
    fn registering_twice_in_one_registry_fails() {
        let registry = Registry::new();
        ErrorCountObserver::register(&registry).unwrap();
        assert!(ErrorCountObserver::register(&registry).is_err());
    }
}
