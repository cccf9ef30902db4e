//! Extractor backends.
//!
//! - [`web`]: GET a page built from a URL template, return the body text.
//! - [`api`]: call a JSON API, return the pretty-printed JSON response.
//! - [`client`]: registry of shared HTTP clients.
//!
//! Both backends deserialize their options from the pipeline's
//! [`ExtractorOptions`] map; this module holds the pieces they share.

pub mod api;
pub mod client;
pub mod web;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ConfigurationError;
use crate::factory::ExtractorOptions;

/// Deserialize a backend's typed options from the generic option map.
pub(crate) fn parse_options<T: DeserializeOwned>(
    backend: &'static str,
    options: &ExtractorOptions,
) -> Result<T, ConfigurationError> {
    serde_json::from_value(Value::Object(options.clone())).map_err(|e| {
        ConfigurationError::InvalidOptions {
            backend,
            message: e.to_string(),
        }
    })
}

/// Cookies given inline or as a path to a JSON file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CookieSource {
    Inline(HashMap<String, String>),
    File(String),
}

impl CookieSource {
    /// Resolve to a cookie map. A string that does not end in `.json` or
    /// `.txt` means "no cookies".
    pub fn resolve(&self) -> Result<Option<HashMap<String, String>>, ConfigurationError> {
        match self {
            CookieSource::Inline(cookies) => Ok(Some(cookies.clone())),
            CookieSource::File(path) if path.ends_with(".json") || path.ends_with(".txt") => {
                let path = PathBuf::from(path);
                let content =
                    fs::read_to_string(&path).map_err(|source| ConfigurationError::Read {
                        path: path.clone(),
                        source,
                    })?;
                let cookies = serde_json::from_str(&content).map_err(|e| {
                    ConfigurationError::Parse {
                        path: path.clone(),
                        message: e.to_string(),
                    }
                })?;
                debug!(cookie_path = ?path, "[CLIENT] Loaded cookies from file");
                Ok(Some(cookies))
            }
            CookieSource::File(other) => {
                warn!(value = %other, "[CLIENT] Ignoring cookies value that is neither a map nor a .json/.txt path");
                Ok(None)
            }
        }
    }
}

/// Build a header map from name/value pairs plus an optional `Cookie` header.
pub(crate) fn build_headers(
    backend: &'static str,
    headers: &HashMap<String, String>,
    cookies: Option<&HashMap<String, String>>,
) -> Result<HeaderMap, ConfigurationError> {
    let invalid = |message: String| ConfigurationError::InvalidOptions { backend, message };

    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| invalid(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| invalid(format!("header value for {name}: {e}")))?;
        map.insert(name, value);
    }
    if let Some(cookies) = cookies.filter(|c| !c.is_empty()) {
        let mut pairs: Vec<String> = cookies.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        let value = HeaderValue::from_str(&pairs.join("; "))
            .map_err(|e| invalid(format!("cookies: {e}")))?;
        map.insert(COOKIE, value);
    }
    Ok(map)
}

/// Convert `delay_between_requests` seconds into a [`Duration`].
pub(crate) fn request_delay(
    backend: &'static str,
    seconds: f64,
) -> Result<Duration, ConfigurationError> {
    Duration::try_from_secs_f64(seconds).map_err(|e| ConfigurationError::InvalidOptions {
        backend,
        message: format!("delay_between_requests must be a non-negative number of seconds, got {seconds}: {e}"),
    })
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}
