// src/collector/descriptor.rs

use std::sync::Arc;

use crate::query::Record;
use crate::types::ValueKind;

/// Stable identity of one exported time series family: name plus label
/// schema. `suffix` is the record value key it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub help: String,
    pub label_keys: Vec<String>,
    pub suffix: String,
}

/// One exported value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub descriptor: Arc<Descriptor>,
    pub kind: ValueKind,
    pub value: f64,
    pub label_values: Vec<String>,
}

impl Sample {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptor
            .label_keys
            .iter()
            .map(String::as_str)
            .zip(self.label_values.iter().map(String::as_str))
    }
}

/// Build one descriptor per value suffix in `shape`, named
/// `<metric_name><suffix>` with `shape`'s label keys.
pub(crate) fn descriptors_for(metric_name: &str, shape: &Record) -> Vec<Arc<Descriptor>> {
    shape
        .values
        .keys()
        .map(|suffix| {
            Arc::new(Descriptor {
                name: format!("{metric_name}{suffix}"),
                help: format!("Result of query {metric_name}"),
                label_keys: shape.label_keys.clone(),
                suffix: suffix.clone(),
            })
        })
        .collect()
}
