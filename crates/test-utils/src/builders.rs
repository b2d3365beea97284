#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use bqexporter::config::model::{ExporterSection, QueryConfig};
use bqexporter::config::{ConfigFile, RawConfigFile};
use bqexporter::query::Record;
use bqexporter::types::ValueKind;

/// Builder for `Record` to simplify test setup.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    label_keys: Vec<String>,
    label_values: Vec<String>,
    values: BTreeMap<String, f64>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.label_keys.push(key.to_string());
        self.label_values.push(value.to_string());
        self
    }

    /// Add a measurement. Use `""` for the unsuffixed `value` column.
    pub fn value(mut self, suffix: &str, value: f64) -> Self {
        self.values.insert(suffix.to_string(), value);
        self
    }

    pub fn build(self) -> Record {
        Record {
            label_keys: self.label_keys,
            label_values: self.label_values,
            values: self.values,
        }
    }
}

/// The single-row result `key=value, okay=1.23`.
pub fn okay_record() -> Record {
    RecordBuilder::new().label("key", "value").value("okay", 1.23).build()
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                exporter: ExporterSection::default(),
                queries: Vec::new(),
            },
        }
    }

    pub fn with_query(mut self, file: &str, kind: ValueKind) -> Self {
        self.config.queries.push(QueryConfig::new(PathBuf::from(file), kind));
        self
    }

    pub fn with_cron_query(mut self, file: &str, kind: ValueKind, cron: &str) -> Self {
        let mut query = QueryConfig::new(PathBuf::from(file), kind);
        query.cron = Some(cron.to_string());
        self.config.queries.push(query);
        self
    }

    pub fn with_project(mut self, project: &str) -> Self {
        self.config.exporter.project = Some(project.to_string());
        self
    }

    pub fn with_refresh(mut self, refresh: &str) -> Self {
        self.config.exporter.refresh = refresh.to_string();
        self
    }

    pub fn reset_stat_on_unregister_failure(mut self) -> Self {
        self.config.exporter.reset_stat_on_unregister_failure = true;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
