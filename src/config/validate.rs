// src/config/validate.rs

use std::collections::HashSet;

use crate::collector::Schedule;
use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, QueryConfig, QuerySpec, RawConfigFile};
use crate::errors::{ExporterError, Result};
use crate::types::{UnregisterFailurePolicy, ValueKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ExporterError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_queries(&raw)?;
        ensure_unique_files(&raw)?;

        let refresh = parse_duration(&raw.exporter.refresh).map_err(|e| {
            ExporterError::ConfigError(format!("[exporter].refresh: {e}"))
        })?;
        if refresh.is_zero() {
            return Err(ExporterError::ConfigError(
                "[exporter].refresh must be greater than zero".to_string(),
            ));
        }

        let queries = raw
            .queries
            .iter()
            .map(validate_query)
            .collect::<Result<Vec<_>>>()?;

        Ok(ConfigFile {
            project: raw.exporter.project,
            port: raw.exporter.port,
            refresh,
            unregister_policy: UnregisterFailurePolicy::from_reset_flag(
                raw.exporter.reset_stat_on_unregister_failure,
            ),
            api_endpoint: raw.exporter.api_endpoint,
            queries,
        })
    }
}

fn ensure_has_queries(cfg: &RawConfigFile) -> Result<()> {
    if cfg.queries.is_empty() {
        return Err(ExporterError::ConfigError(
            "no query sources configured; pass --gauge-query/--counter-query or add [[query]] entries"
                .to_string(),
        ));
    }
    Ok(())
}

fn ensure_unique_files(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for query in cfg.queries.iter() {
        if !seen.insert(&query.file) {
            return Err(ExporterError::ConfigError(format!(
                "query file {:?} is listed more than once",
                query.file
            )));
        }
    }
    Ok(())
}

fn validate_query(query: &QueryConfig) -> Result<QuerySpec> {
    let kind: ValueKind = query.kind.parse().map_err(|e: String| {
        ExporterError::ConfigError(format!("query {:?}: {e}", query.file))
    })?;

    // Structured config is explicit, so a bad expression here is a hard
    // error rather than a silent fallback.
    if let Some(expr) = query.cron.as_deref() {
        Schedule::parse(expr).map_err(|e| {
            ExporterError::ConfigError(format!("query {:?}: {e}", query.file))
        })?;
    }

    Ok(QuerySpec {
        file: query.file.clone(),
        kind,
        cron: query.cron.clone(),
    })
}
