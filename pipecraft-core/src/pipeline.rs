//! High-level pipeline: expands resources, resolves output paths, runs the
//! extractor and writes every payload to disk.
//!
//! A [`Pipeline`] holds the job-level settings (backend type, URL template,
//! output pattern, resources, options). Each call to [`Pipeline::run`] takes
//! an [`Invocation`] carrying the per-call parameters and option overrides and:
//!   1. Loads defaults from the config file, if one is set. Settings given on
//!      the pipeline win over the file.
//!   2. Fails fast on a missing output pattern or an unknown backend type,
//!      before any resource is expanded.
//!   3. Layers backend options: config file < pipeline < invocation.
//!   4. Expands the resources and merges the invocation parameters on top of
//!      every record.
//!   5. Resolves each record's output path and, with `skip_if_exists`, sets
//!      aside records whose file already exists.
//!   6. Builds the backend and extracts the remaining records in order.
//!   7. Writes each fetched payload to its record's path.
//!
//! The result lists the written paths in expansion order, followed by the
//! skipped paths in expansion order.
//!
//! # Error Handling
//! Configuration and resource errors abort the run before any request is sent.
//! Failed extractions are contained in the batch and only reduce the output;
//! a failed file write aborts the run.
//!
//! # Navigation
//! - Main entrypoint: [`Pipeline::run`]
//! - Dry run: [`Pipeline::plan`]

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::contract::BackendFactory;
use crate::error::{ConfigurationError, PipelineError};
use crate::factory::{merge_options, ExtractorFactory, ExtractorOptions, ExtractorType};
use crate::output::{OutputPattern, ResolvedOutput};
use crate::record::ParameterRecord;
use crate::resources::ResourceProvider;

type ParamsFn = Box<dyn FnOnce() -> Option<ParameterRecord> + Send>;

/// Per-call inputs to [`Pipeline::run`].
#[derive(Default)]
pub struct Invocation {
    params_fn: Option<ParamsFn>,
    options: ExtractorOptions,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters merged on top of every expanded record.
    pub fn params(self, params: ParameterRecord) -> Self {
        self.params_fn(move || Some(params))
    }

    /// Function producing the per-call parameters. Called once per run,
    /// after the configuration has been checked.
    pub fn params_fn<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Option<ParameterRecord> + Send + 'static,
    {
        self.params_fn = Some(Box::new(f));
        self
    }

    /// Backend option override with the highest precedence.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: ExtractorOptions) -> Self {
        self.options.extend(options);
        self
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("params_fn", &self.params_fn.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// Everything decided before the backend is built.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub source_name: Option<String>,
    pub extractor_type: ExtractorType,
    pub options: ExtractorOptions,
    pub output_pattern: OutputPattern,
    pub to_fetch: Vec<ResolvedOutput>,
    pub skipped: Vec<ResolvedOutput>,
}

/// A configured extraction job.
#[derive(Clone)]
pub struct Pipeline {
    source_name: Option<String>,
    extractor_type: Option<String>,
    url_template: Option<String>,
    output_pattern: Option<OutputPattern>,
    resources: Option<Arc<ResourceProvider>>,
    config_path: Option<PathBuf>,
    skip_if_exists: bool,
    options: ExtractorOptions,
    factory: Arc<dyn BackendFactory>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            source_name: None,
            extractor_type: None,
            url_template: None,
            output_pattern: None,
            resources: None,
            config_path: None,
            skip_if_exists: false,
            options: ExtractorOptions::new(),
            factory: Arc::new(ExtractorFactory::default()),
        }
    }

    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn extractor_type(mut self, extractor_type: impl Into<String>) -> Self {
        self.extractor_type = Some(extractor_type.into());
        self
    }

    pub fn url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    pub fn output_pattern(mut self, pattern: impl Into<OutputPattern>) -> Self {
        self.output_pattern = Some(pattern.into());
        self
    }

    pub fn resources(mut self, provider: Arc<ResourceProvider>) -> Self {
        self.resources = Some(provider);
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn skip_if_exists(mut self, skip: bool) -> Self {
        self.skip_if_exists = skip;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: ExtractorOptions) -> Self {
        self.options.extend(options);
        self
    }

    /// Replace the backend factory (the default builds the api/web backends).
    pub fn factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Resolve settings, expand resources and partition records into those to
    /// fetch and those to skip. Sends no requests.
    pub fn plan(&self, invocation: Invocation) -> Result<ExtractionPlan, PipelineError> {
        let config = match &self.config_path {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        let output_pattern = self
            .output_pattern
            .clone()
            .or_else(|| config.output_pattern.clone().map(OutputPattern::Template))
            .ok_or_else(|| {
                error!("[PIPELINE] No output pattern in arguments or config");
                ConfigurationError::MissingOutputPattern
            })?;
        let extractor_type: ExtractorType = self
            .extractor_type
            .clone()
            .or_else(|| config.extractor_type.clone())
            .ok_or(ConfigurationError::MissingExtractorType)?
            .parse()?;
        let source_name = self.source_name.clone().or(config.source_name.clone());
        let url_template = self.url_template.clone().or(config.url_template.clone());

        let mut base = ExtractorOptions::new();
        if let Some(name) = &source_name {
            base.insert("source_name".to_string(), Value::String(name.clone()));
        }
        if let Some(template) = &url_template {
            base.insert("url_template".to_string(), Value::String(template.clone()));
        }
        let options = merge_options([&base, &config.options, &self.options, &invocation.options]);

        let extra = invocation.params_fn.and_then(|f| f());
        let records = match &self.resources {
            Some(provider) => {
                let expanded = provider.get_resources()?.expand()?;
                match &extra {
                    Some(extra) => expanded.iter().map(|r| r.merged(extra)).collect(),
                    None => expanded,
                }
            }
            None => vec![extra.unwrap_or_default()],
        };
        debug!(records = records.len(), "[PIPELINE] Records expanded");

        let mut to_fetch = Vec::new();
        let mut skipped = Vec::new();
        for params in records {
            let path = output_pattern.resolve(&params)?;
            let resolved = ResolvedOutput { params, path };
            if self.skip_if_exists && resolved.path.exists() {
                debug!(path = %resolved.path.display(), "[PIPELINE] Output exists, skipping");
                skipped.push(resolved);
            } else {
                to_fetch.push(resolved);
            }
        }

        info!(
            source_name = source_name.as_deref().unwrap_or("-"),
            %extractor_type,
            to_fetch = to_fetch.len(),
            skipped = skipped.len(),
            "[PIPELINE] Extraction planned"
        );
        Ok(ExtractionPlan {
            source_name,
            extractor_type,
            options,
            output_pattern,
            to_fetch,
            skipped,
        })
    }

    /// Plan and execute one run, returning written paths then skipped paths.
    pub async fn run(&self, invocation: Invocation) -> Result<Vec<PathBuf>, PipelineError> {
        let plan = self.plan(invocation)?;
        self.execute(plan).await
    }

    /// Build the backend, extract the planned records and write the payloads.
    pub async fn execute(&self, plan: ExtractionPlan) -> Result<Vec<PathBuf>, PipelineError> {
        let extractor = self.factory.create(plan.extractor_type, &plan.options)?;

        let requested = plan.to_fetch.len();
        let params_list = plan.to_fetch.into_iter().map(|o| o.params).collect();
        let outcomes = extractor.extract_batch(params_list).await;

        let mut written = Vec::with_capacity(outcomes.len());
        let mut failed = 0usize;
        for outcome in outcomes {
            let payload = match outcome.result {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, params = ?outcome.params, "[PIPELINE] No output for record");
                    failed += 1;
                    continue;
                }
            };
            let path = plan.output_pattern.resolve(&outcome.params)?;
            write_output(&path, &payload)?;
            written.push(path);
        }

        info!(
            source_name = plan.source_name.as_deref().unwrap_or("-"),
            requested,
            written = written.len(),
            failed,
            "[PIPELINE] Extraction finished"
        );
        if !plan.skipped.is_empty() {
            info!(skipped = plan.skipped.len(), "[PIPELINE] Skipped existing outputs");
        }

        written.extend(plan.skipped.into_iter().map(|o| o.path));
        Ok(written)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source_name", &self.source_name)
            .field("extractor_type", &self.extractor_type)
            .field("url_template", &self.url_template)
            .field("output_pattern", &self.output_pattern)
            .field("resources", &self.resources)
            .field("config_path", &self.config_path)
            .field("skip_if_exists", &self.skip_if_exists)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn write_output(path: &Path, payload: &str) -> Result<(), PipelineError> {
    let filesystem = |source: std::io::Error| PipelineError::Filesystem {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(filesystem)?;
    }
    fs::write(path, payload).map_err(|source| {
        error!(error = ?source, path = %path.display(), "[PIPELINE] Failed to write output");
        filesystem(source)
    })?;
    info!(path = %path.display(), bytes = payload.len(), "[PIPELINE] Wrote output");
    Ok(())
}
