// src/query/record.rs

use std::collections::BTreeMap;

/// One row of a query result, shaped for metric export.
///
/// `label_keys` and `label_values` are parallel: the i-th value belongs to the
/// i-th key. `values` maps a metric-name suffix to its measurement. Within one
/// result set every record is expected to share the same label keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub label_keys: Vec<String>,
    pub label_values: Vec<String>,
    pub values: BTreeMap<String, f64>,
}

impl Record {
    pub fn new<K, V, S>(label_keys: K, label_values: V, values: S) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
        S: IntoIterator<Item = (String, f64)>,
    {
        Self {
            label_keys: label_keys.into_iter().map(Into::into).collect(),
            label_values: label_values.into_iter().map(Into::into).collect(),
            values: values.into_iter().collect(),
        }
    }

    /// Measurement for `suffix`, if the row carried one.
    pub fn value(&self, suffix: &str) -> Option<f64> {
        self.values.get(suffix).copied()
    }

    /// Iterate over `(key, value)` label pairs.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.label_keys
            .iter()
            .map(String::as_str)
            .zip(self.label_values.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_pair_keys_with_values_in_order() {
        let record = Record::new(
            ["machine", "site"],
            ["mlab1", "lga03"],
            [("".to_string(), 4.0)],
        );
        let labels: Vec<_> = record.labels().collect();
        assert_eq!(labels, vec![("machine", "mlab1"), ("site", "lga03")]);
        assert_eq!(record.value(""), Some(4.0));
        assert_eq!(record.value("_p50"), None);
    }
}
