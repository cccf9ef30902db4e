//! Resource data: the parameter space a pipeline run iterates over.
//!
//! Two shapes are supported:
//! - **multiple**: field name (plural) → list of candidate values, expanded as
//!   a cartesian product with the first key varying slowest.
//! - **simple**: a ready-made list of records, used as-is.
//!
//! [`ResourceProvider`] wraps the producer of that data and memoizes the first
//! valid result.

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::config::load_document;
use crate::error::PipelineError;
use crate::record::ParameterRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    /// Plural field name → candidate values.
    Multiple(Map<String, Value>),
    /// Pre-built records; every element must be a mapping.
    Simple(Vec<Value>),
}

impl ResourceData {
    /// Multiple-mode data from `(field, values)` pairs, in iteration order.
    pub fn multiple<K, I, V>(lists: impl IntoIterator<Item = (K, I)>) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        ResourceData::Multiple(
            lists
                .into_iter()
                .map(|(key, values)| {
                    let values = values.into_iter().map(Into::into).collect();
                    (key.into(), Value::Array(values))
                })
                .collect(),
        )
    }

    /// Simple-mode data from ready-made records.
    pub fn simple(records: impl IntoIterator<Item = ParameterRecord>) -> Self {
        ResourceData::Simple(
            records
                .into_iter()
                .map(|record| {
                    Value::Object(
                        record
                            .iter()
                            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    /// Interpret a parsed document: a mapping is multiple mode, a sequence is
    /// simple mode.
    pub fn from_value(value: Value) -> Result<Self, PipelineError> {
        match value {
            Value::Object(map) => Ok(ResourceData::Multiple(map)),
            Value::Array(items) => Ok(ResourceData::Simple(items)),
            other => Err(PipelineError::InvalidResourceData(format!(
                "expected a mapping of value lists or a list of records, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn validate(&self) -> bool {
        match self {
            ResourceData::Multiple(lists) => lists.values().all(Value::is_array),
            ResourceData::Simple(records) => records.iter().all(Value::is_object),
        }
    }

    /// Expand into the ordered list of parameter records.
    ///
    /// Multiple mode drops one trailing `s` from each key and renders every
    /// value as text. An empty value list yields no records at all.
    pub fn expand(&self) -> Result<Vec<ParameterRecord>, PipelineError> {
        if !self.validate() {
            return Err(PipelineError::InvalidResourceData(self.describe_invalid()));
        }
        match self {
            ResourceData::Multiple(lists) => {
                let mut combinations: Vec<Vec<(String, String)>> = vec![Vec::new()];
                for (key, values) in lists {
                    let field = singular(key).to_string();
                    let values: Vec<String> = values
                        .as_array()
                        .map(|items| items.iter().map(value_to_text).collect())
                        .unwrap_or_default();
                    combinations = combinations
                        .into_iter()
                        .flat_map(|prefix| {
                            let field = field.clone();
                            values.iter().map(move |value| {
                                let mut next = prefix.clone();
                                next.push((field.clone(), value.clone()));
                                next
                            })
                        })
                        .collect();
                }
                Ok(combinations
                    .into_iter()
                    .map(|fields| fields.into_iter().collect::<ParameterRecord>())
                    .collect())
            }
            ResourceData::Simple(records) => Ok(records
                .iter()
                .filter_map(Value::as_object)
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), value_to_text(v)))
                        .collect::<ParameterRecord>()
                })
                .collect()),
        }
    }

    fn describe_invalid(&self) -> String {
        match self {
            ResourceData::Multiple(lists) => {
                let offending: Vec<&str> = lists
                    .iter()
                    .filter(|(_, v)| !v.is_array())
                    .map(|(k, _)| k.as_str())
                    .collect();
                format!("values for {offending:?} are not lists")
            }
            ResourceData::Simple(records) => {
                let offending: Vec<usize> = records
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_object())
                    .map(|(i, _)| i)
                    .collect();
                format!("records at positions {offending:?} are not mappings")
            }
        }
    }
}

fn singular(key: &str) -> &str {
    key.strip_suffix('s').unwrap_or(key)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

type Producer = Box<dyn Fn() -> Result<ResourceData, PipelineError> + Send + Sync>;

/// Lazily produces, validates and caches a [`ResourceData`].
///
/// The producer runs on the first [`get_resources`](Self::get_resources) call
/// and again on later calls only until one result validates. Empty but valid
/// data counts as fetched.
pub struct ResourceProvider {
    producer: Producer,
    resources: OnceCell<ResourceData>,
}

impl ResourceProvider {
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn() -> ResourceData + Send + Sync + 'static,
    {
        Self::try_new(move || Ok(producer()))
    }

    /// Like [`new`](Self::new) for producers that can fail.
    pub fn try_new<F>(producer: F) -> Self
    where
        F: Fn() -> Result<ResourceData, PipelineError> + Send + Sync + 'static,
    {
        Self {
            producer: Box::new(producer),
            resources: OnceCell::new(),
        }
    }

    /// Provider reading a YAML/TOML/JSON resource document from `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let path: PathBuf = path.as_ref().to_path_buf();
        Self::try_new(move || {
            info!(resource_path = ?path, "[RESOURCES] Loading resources from file");
            let document = load_document(&path)?;
            ResourceData::from_value(document)
        })
    }

    pub fn get_resources(&self) -> Result<&ResourceData, PipelineError> {
        self.resources.get_or_try_init(|| {
            let data = (self.producer)()?;
            if !data.validate() {
                let reason = data.describe_invalid();
                error!(%reason, "[RESOURCES] Invalid resource data structure");
                return Err(PipelineError::InvalidResourceData(reason));
            }
            debug!(?data, "[RESOURCES] Resource data validated and cached");
            Ok(data)
        })
    }

    pub fn is_fetched(&self) -> bool {
        self.resources.get().is_some()
    }
}

impl std::fmt::Debug for ResourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceProvider")
            .field("resources", &self.resources.get())
            .finish_non_exhaustive()
    }
}

/// Wrap a producer function into a [`ResourceProvider`].
pub fn resources<F>(producer: F) -> ResourceProvider
where
    F: Fn() -> ResourceData + Send + Sync + 'static,
{
    ResourceProvider::new(producer)
}
