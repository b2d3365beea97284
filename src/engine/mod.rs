// src/engine/mod.rs

//! Reconciliation engine for bqexporter.
//!
//! This module ties together:
//! - the query sources (file watchers) and the caches they own
//! - the factory that builds a fresh cache when a source changes
//! - the periodic loop that drives both, aligned to refresh boundaries
//! - observers that see a report of every tick
//!
//! The synchronous tick lives in [`reconcile`]; it is what tests drive
//! directly. [`reconcile::Reconciler::run`] is the async shell around it.

pub mod factory;
pub mod observer;
pub mod reconcile;
pub mod report;

pub use factory::CacheFactory;
pub use observer::{ErrorCountObserver, TickObserver};
pub use reconcile::Reconciler;
pub use report::{SourceAction, SourceReport, TickReport};
