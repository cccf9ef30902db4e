#![doc = "pipecraft-core: declarative batch extraction."]

//! Turns a compact description of a parameter space into one request per
//! parameter combination, runs the requests through a pluggable extractor
//! backend and writes every response to a path derived from its parameters.
//!
//! # Usage
//! ```no_run
//! use std::sync::Arc;
//! use pipecraft_core::{resources, Invocation, Pipeline, ResourceData};
//!
//! # async fn demo() -> Result<(), pipecraft_core::PipelineError> {
//! let pages = resources(|| ResourceData::multiple([("authors", ["tolkien", "le-guin"])]));
//! let paths = Pipeline::new()
//!     .source_name("quotes")
//!     .extractor_type("web")
//!     .url_template("https://example.com/quotes/$author")
//!     .output_pattern("out/$author.html")
//!     .resources(Arc::new(pages))
//!     .skip_if_exists(true)
//!     .run(Invocation::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod contract;
pub mod error;
pub mod extractors;
pub mod factory;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod resources;
pub mod template;

pub use config::ConfigFile;
pub use contract::{BackendFactory, BatchPolicy, ExtractionOutcome, Extractor};
pub use error::{ConfigurationError, ExtractionError, PipelineError};
pub use factory::{merge_options, AuthCallback, ExtractorFactory, ExtractorOptions, ExtractorType};
pub use output::{OutputPattern, ResolvedOutput};
pub use pipeline::{ExtractionPlan, Invocation, Pipeline};
pub use record::ParameterRecord;
pub use resources::{resources, ResourceData, ResourceProvider};
pub use template::safe_substitute;
