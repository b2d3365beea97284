// src/collector/exposition.rs

//! `prometheus` crate integration.
//!
//! [`PrometheusRegistry`] runs a cache's bootstrap query before touching the
//! `prometheus::Registry`, whose write lock would otherwise stall every
//! scrape for as long as the query takes. A cache with a catalog is then
//! wrapped in its own `prometheus::core::Collector`. A cache without one
//! (first query failed or returned no rows) is served by a single shared
//! collector that declares no descriptors.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{debug, warn};

use crate::collector::cache::ScheduledCache;
use crate::collector::descriptor::Sample;
use crate::collector::registry::MetricsRegistry;
use crate::errors::{ExporterError, Result};
use crate::types::ValueKind;

/// A cache whose catalog was built before registration. Its `Desc` list is
/// fixed at construction so unregistering computes the same collector id.
struct CacheCollector {
    cache: Arc<ScheduledCache>,
    descs: Vec<Desc>,
}

impl CacheCollector {
    fn new(cache: Arc<ScheduledCache>) -> Self {
        let descs = cache
            .descriptors()
            .iter()
            .filter_map(|d| new_desc(&d.name, &d.help, d.label_keys.clone()))
            .collect();
        Self { cache, descs }
    }
}

fn new_desc(name: &str, help: &str, labels: Vec<String>) -> Option<Desc> {
    match Desc::new(name.to_string(), help.to_string(), labels, HashMap::new()) {
        Ok(desc) => Some(desc),
        Err(err) => {
            warn!(metric = %name, %err, "invalid metric descriptor");
            None
        }
    }
}

struct SharedCollector(Arc<CacheCollector>);

impl Collector for SharedCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.0.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        metric_families(self.0.cache.collect())
    }
}

/// Serves every cache that was registered before it had any rows.
///
/// It reports no descriptors, so the registry reserves no names for these
/// caches and a later cache for the same metric may use any label schema.
struct PendingCollector {
    active: Arc<Mutex<HashMap<usize, Entry>>>,
}

impl Collector for PendingCollector {
    fn desc(&self) -> Vec<&Desc> {
        Vec::new()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let pending: Vec<Arc<ScheduledCache>> = self
            .active
            .lock()
            .values()
            .filter_map(|entry| match entry {
                Entry::Pending(cache) => Some(Arc::clone(cache)),
                Entry::Described(_) => None,
            })
            .collect();
        pending
            .iter()
            .flat_map(|cache| metric_families(cache.collect()))
            .collect()
    }
}

#[derive(Clone)]
enum Entry {
    Described(Arc<CacheCollector>),
    Pending(Arc<ScheduledCache>),
}

impl Entry {
    fn metric_name(&self) -> &str {
        match self {
            Entry::Described(collector) => collector.cache.metric_name(),
            Entry::Pending(cache) => cache.metric_name(),
        }
    }
}

/// Group samples into one family per descriptor name.
pub fn metric_families(samples: Vec<Sample>) -> Vec<MetricFamily> {
    let mut families: BTreeMap<String, MetricFamily> = BTreeMap::new();

    for sample in samples {
        if sample.label_values.len() != sample.descriptor.label_keys.len() {
            warn!(
                metric = %sample.name(),
                expected = sample.descriptor.label_keys.len(),
                got = sample.label_values.len(),
                "label count mismatch; dropping sample"
            );
            continue;
        }

        let family = families
            .entry(sample.descriptor.name.clone())
            .or_insert_with(|| {
                let mut mf = MetricFamily::default();
                mf.set_name(sample.descriptor.name.clone());
                mf.set_help(sample.descriptor.help.clone());
                mf.set_field_type(match sample.kind {
                    ValueKind::Gauge => MetricType::GAUGE,
                    ValueKind::Counter => MetricType::COUNTER,
                });
                mf
            });
        family.mut_metric().push(to_metric(&sample));
    }

    families.into_values().collect()
}

fn to_metric(sample: &Sample) -> proto::Metric {
    let labels: Vec<LabelPair> = sample
        .labels()
        .map(|(k, v)| {
            let mut pair = LabelPair::default();
            pair.set_name(k.to_string());
            pair.set_value(v.to_string());
            pair
        })
        .collect();

    let mut metric = proto::Metric::default();
    metric.set_label(labels.into());
    match sample.kind {
        ValueKind::Gauge => {
            let mut gauge = proto::Gauge::default();
            gauge.set_value(sample.value);
            metric.set_gauge(gauge);
        }
        ValueKind::Counter => {
            let mut counter = proto::Counter::default();
            counter.set_value(sample.value);
            metric.set_counter(counter);
        }
    }
    metric
}

/// [`MetricsRegistry`] backed by a `prometheus::Registry`.
#[derive(Clone)]
pub struct PrometheusRegistry {
    registry: Registry,
    active: Arc<Mutex<HashMap<usize, Entry>>>,
}

impl fmt::Debug for PrometheusRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusRegistry")
            .field("active", &self.active.lock().len())
            .finish_non_exhaustive()
    }
}

fn cache_key(cache: &Arc<ScheduledCache>) -> usize {
    Arc::as_ptr(cache) as usize
}

impl PrometheusRegistry {
    /// Wrap `registry`, installing the collector that serves caches
    /// registered before their first rows arrived.
    pub fn new(registry: Registry) -> Result<Self> {
        let active = Arc::default();
        registry.register(Box::new(PendingCollector {
            active: Arc::clone(&active),
        }))?;
        Ok(Self { registry, active })
    }

    /// The underlying registry, e.g. to register process-level metrics.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render everything in the registry in the Prometheus text format.
    pub fn render_text(&self) -> Result<String> {
        render_text(&self.registry)
    }
}

/// Render all metric families gathered from `registry` as exposition text.
pub fn render_text(registry: &Registry) -> Result<String> {
    let families = registry.gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ExporterError::Other(e.into()))
}

impl MetricsRegistry for PrometheusRegistry {
    fn register(&self, cache: Arc<ScheduledCache>) -> Result<()> {
        let metric = cache.metric_name().to_string();
        let refused = |reason: String| ExporterError::RegisterFailed {
            source_name: metric.clone(),
            reason,
        };

        // Bootstrap query; no lock is held here.
        let catalog = cache.describe();

        let key = cache_key(&cache);
        if self
            .active
            .lock()
            .values()
            .any(|entry| entry.metric_name() == metric)
        {
            return Err(refused(format!("metric {metric} is already registered")));
        }

        if catalog.is_empty() {
            debug!(metric = %metric, "no rows yet; serving through the pending collector");
            self.active.lock().insert(key, Entry::Pending(cache));
            return Ok(());
        }

        let collector = Arc::new(CacheCollector::new(cache));
        self.registry
            .register(Box::new(SharedCollector(Arc::clone(&collector))))
            .map_err(|e| refused(e.to_string()))?;
        self.active.lock().insert(key, Entry::Described(collector));
        Ok(())
    }

    fn unregister(&self, cache: &Arc<ScheduledCache>) -> bool {
        let key = cache_key(cache);
        let Some(entry) = self.active.lock().get(&key).cloned() else {
            debug!(metric = %cache.metric_name(), "unregister of unknown cache");
            return false;
        };

        match entry {
            Entry::Pending(_) => {
                self.active.lock().remove(&key);
                true
            }
            Entry::Described(collector) => {
                match self.registry.unregister(Box::new(SharedCollector(collector))) {
                    Ok(()) => {
                        self.active.lock().remove(&key);
                        true
                    }
                    Err(err) => {
                        warn!(metric = %cache.metric_name(), %err, "registry refused unregister");
                        false
                    }
                }
            }
        }
    }
}
