//! Error types for the extraction pipeline.
//!
//! Configuration and resource errors are fatal and abort a run before any
//! request is issued. Extraction errors are contained per record by the
//! backends and only surface here when a backend cannot be constructed.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("invalid resource data: {0}")]
    InvalidResourceData(String),

    /// Raised while constructing a backend (auth callback, client build).
    #[error("extractor error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("failed to write {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors in the job description itself.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("output_pattern must be given as an argument or in the config file")]
    MissingOutputPattern,

    #[error("extractor_type must be given as an argument or in the config file")]
    MissingExtractorType,

    #[error("unsupported extractor type: {0}")]
    UnsupportedBackend(String),

    #[error("invalid options for the {backend} extractor: {message}")]
    InvalidOptions {
        backend: &'static str,
        message: String,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Failure of a single extraction request.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}
