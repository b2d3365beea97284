// src/engine/factory.rs

use std::sync::Arc;

use crate::clock::Clock;
use crate::collector::{Schedule, ScheduledCache};
use crate::errors::Result;
use crate::query::{QueryRunner, QueryTemplate};
use crate::watch::QuerySource;

/// Builds a fresh [`ScheduledCache`] for a source whose file changed.
///
/// Loads and renders the query file, resolves the schedule (config `cron`,
/// then in-text directive, then default) and binds the shared runner and
/// clock.
#[derive(Debug, Clone)]
pub struct CacheFactory {
    runner: Arc<dyn QueryRunner>,
    clock: Arc<dyn Clock>,
    template: QueryTemplate,
}

impl CacheFactory {
    pub fn new(runner: Arc<dyn QueryRunner>, clock: Arc<dyn Clock>, template: QueryTemplate) -> Self {
        Self {
            runner,
            clock,
            template,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn build(&self, source: &QuerySource) -> Result<ScheduledCache> {
        let query = self.template.load(source.path())?;
        let schedule = Schedule::resolve(source.cron(), &query, self.clock.now())?;
        Ok(ScheduledCache::with_schedule(
            Arc::clone(&self.runner),
            Arc::clone(&self.clock),
            source.kind(),
            source.metric_name(),
            query,
            schedule,
        ))
    }
}
