//! Backend selection and option layering.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::contract::{BackendFactory, Extractor};
use crate::error::{ConfigurationError, ExtractionError, PipelineError};
use crate::extractors::api::ApiExtractor;
use crate::extractors::client::ClientRegistry;
use crate::extractors::web::WebExtractor;

/// Backend-specific constructor options, passed through verbatim.
pub type ExtractorOptions = Map<String, Value>;

/// Produces a bearer token for the api backend.
pub type AuthCallback = Arc<dyn Fn() -> Result<String, ExtractionError> + Send + Sync>;

/// The closed set of registered backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorType {
    Api,
    Web,
}

impl ExtractorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractorType::Api => "api",
            ExtractorType::Web => "web",
        }
    }
}

impl fmt::Display for ExtractorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractorType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(ExtractorType::Api),
            "web" => Ok(ExtractorType::Web),
            other => {
                error!(extractor_type = %other, "[FACTORY] Unsupported extractor type");
                Err(ConfigurationError::UnsupportedBackend(other.to_string()))
            }
        }
    }
}

/// Layer option maps in increasing precedence, then drop null entries.
///
/// A null in a later layer therefore removes a value set by an earlier one.
pub fn merge_options<'a>(layers: impl IntoIterator<Item = &'a ExtractorOptions>) -> ExtractorOptions {
    let mut merged = ExtractorOptions::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged.retain(|_, value| !value.is_null());
    merged
}

/// Default [`BackendFactory`]: builds the api and web backends.
#[derive(Clone)]
pub struct ExtractorFactory {
    clients: Arc<ClientRegistry>,
    auth_callback: Option<AuthCallback>,
}

impl ExtractorFactory {
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        Self {
            clients,
            auth_callback: None,
        }
    }

    pub fn with_auth_callback(mut self, callback: AuthCallback) -> Self {
        self.auth_callback = Some(callback);
        self
    }
}

impl Default for ExtractorFactory {
    fn default() -> Self {
        Self::new(ClientRegistry::global())
    }
}

impl fmt::Debug for ExtractorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorFactory")
            .field("clients", &self.clients)
            .field("auth_callback", &self.auth_callback.is_some())
            .finish()
    }
}

impl BackendFactory for ExtractorFactory {
    fn create(
        &self,
        extractor_type: ExtractorType,
        options: &ExtractorOptions,
    ) -> Result<Box<dyn Extractor>, PipelineError> {
        debug!(%extractor_type, option_keys = ?options.keys().collect::<Vec<_>>(), "[FACTORY] Creating extractor");
        let extractor: Box<dyn Extractor> = match extractor_type {
            ExtractorType::Api => Box::new(ApiExtractor::from_options(
                options,
                &self.clients,
                self.auth_callback.as_ref(),
            )?),
            ExtractorType::Web => Box::new(WebExtractor::from_options(options, &self.clients)?),
        };
        info!(%extractor_type, "[FACTORY] Extractor created");
        Ok(extractor)
    }
}
