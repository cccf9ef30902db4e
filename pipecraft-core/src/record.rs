//! Parameter records: one named set of values per extraction request.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A mapping from field name to text value.
///
/// Records drive both the request sent by a backend and the output path the
/// response is written to. Field order is the order fields were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterRecord(IndexMap<String, String>);

impl ParameterRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this record with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Shallow merge: fields of `overrides` replace fields of `self`.
    pub fn merged(&self, overrides: &ParameterRecord) -> ParameterRecord {
        let mut fields = self.0.clone();
        for (key, value) in &overrides.0 {
            fields.insert(key.clone(), value.clone());
        }
        ParameterRecord(fields)
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ParameterRecord(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for ParameterRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(fields: [(K, V); N]) -> Self {
        fields.into_iter().collect()
    }
}
