// src/collector/mod.rs

//! Scheduled caches and their registry integration.
//!
//! - [`schedule`] compiles cron expressions and resolves where a query's
//!   schedule comes from.
//! - [`cache`] holds [`ScheduledCache`], the per-query snapshot with its
//!   schedule gate and descriptor catalog.
//! - [`descriptor`] defines the descriptor and sample types it produces.
//! - [`registry`] is the registry capability source watchers talk to.
//! - [`exposition`] implements that capability on top of the `prometheus`
//!   crate and renders the text exposition format.

pub mod cache;
pub mod descriptor;
pub mod exposition;
pub mod registry;
pub mod schedule;

pub use cache::{ScheduledCache, UpdateOutcome};
pub use descriptor::{Descriptor, Sample};
pub use exposition::{render_text, PrometheusRegistry};
pub use registry::MetricsRegistry;
pub use schedule::{Schedule, CRON_DIRECTIVE, DEFAULT_CRON};
