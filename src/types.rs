// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How a query's measurements are exposed to the monitoring system.
///
/// - `Gauge`: the last observed value; may go up or down between refreshes.
/// - `Counter`: a monotonically interpreted value (the query is expected to
///   return cumulative totals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Gauge,
    Counter,
}

impl Default for ValueKind {
    fn default() -> Self {
        ValueKind::Gauge
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gauge" => Ok(ValueKind::Gauge),
            "counter" => Ok(ValueKind::Counter),
            other => Err(format!(
                "invalid kind: {other} (expected \"gauge\" or \"counter\")"
            )),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Gauge => f.write_str("gauge"),
            ValueKind::Counter => f.write_str("counter"),
        }
    }
}

/// What a source watcher does with its stored modification time when the
/// registry refuses to unregister the previous collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnregisterFailurePolicy {
    /// Keep the timestamp; the source stays without a collector until the
    /// file changes again.
    KeepTimestamp,
    /// Forget the timestamp so the next tick treats the source as new and
    /// retries registration.
    ResetTimestamp,
}

impl Default for UnregisterFailurePolicy {
    fn default() -> Self {
        UnregisterFailurePolicy::KeepTimestamp
    }
}

impl UnregisterFailurePolicy {
    pub fn from_reset_flag(reset: bool) -> Self {
        if reset {
            UnregisterFailurePolicy::ResetTimestamp
        } else {
            UnregisterFailurePolicy::KeepTimestamp
        }
    }
}
