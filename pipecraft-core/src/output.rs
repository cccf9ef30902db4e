//! Output path resolution.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::PipelineError;
use crate::record::ParameterRecord;
use crate::template::safe_substitute;

type PathFn = Arc<dyn Fn(&ParameterRecord) -> PathBuf + Send + Sync>;

/// Where a record's payload is written.
#[derive(Clone)]
pub enum OutputPattern {
    /// `$name` template filled from the record's fields.
    Template(String),
    /// Caller-supplied path function.
    Function(PathFn),
}

impl OutputPattern {
    pub fn template(template: impl Into<String>) -> Self {
        OutputPattern::Template(template.into())
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&ParameterRecord) -> PathBuf + Send + Sync + 'static,
    {
        OutputPattern::Function(Arc::new(f))
    }

    /// Absolute output path for `params`.
    pub fn resolve(&self, params: &ParameterRecord) -> Result<PathBuf, PipelineError> {
        let path = match self {
            OutputPattern::Template(template) => PathBuf::from(safe_substitute(template, params)),
            OutputPattern::Function(f) => f(params),
        };
        absolute(&path)
    }
}

impl fmt::Debug for OutputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPattern::Template(template) => f.debug_tuple("Template").field(template).finish(),
            OutputPattern::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<&str> for OutputPattern {
    fn from(template: &str) -> Self {
        OutputPattern::template(template)
    }
}

impl From<String> for OutputPattern {
    fn from(template: String) -> Self {
        OutputPattern::Template(template)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, PipelineError> {
    std::path::absolute(path).map_err(|source| PipelineError::Filesystem {
        path: path.to_path_buf(),
        source,
    })
}

/// A record paired with the absolute path its payload goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOutput {
    pub params: ParameterRecord,
    pub path: PathBuf,
}
