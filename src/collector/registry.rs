// src/collector/registry.rs

use std::fmt::Debug;
use std::sync::Arc;

use crate::collector::cache::ScheduledCache;
use crate::errors::Result;

/// Metrics registry capability used by source watchers.
///
/// Implementations must call [`ScheduledCache::describe`] while registering,
/// the way a Prometheus registry asks a collector for its descriptors; that
/// call is what runs a new cache's first query, so it has to happen before
/// taking any lock that scrapes also take.
pub trait MetricsRegistry: Send + Sync + Debug {
    fn register(&self, cache: Arc<ScheduledCache>) -> Result<()>;

    /// Remove a previously registered cache. Returns `false` if the registry
    /// did not (or could not) remove it.
    fn unregister(&self, cache: &Arc<ScheduledCache>) -> bool;
}
