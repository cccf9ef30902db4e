//! Job configuration files.
//!
//! A config file supplies defaults for any pipeline setting that is not given
//! explicitly. Three serializations are accepted, chosen by file extension:
//! YAML (`.yaml`, `.yml`), TOML (`.toml`) and JSON (`.json`).
//!
//! ```yaml
//! source_name: quotes
//! extractor_type: web
//! url_template: "https://example.com/quotes/$author?page=$page"
//! output_pattern: "out/$author/$page.html"
//! options:
//!   delay_between_requests: 0.5
//!   max_retries: 2
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use crate::error::ConfigurationError;
use crate::factory::ExtractorOptions;

/// Serialization of a config or resource document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(ConfigurationError::UnsupportedFormat(
                path.display().to_string(),
            )),
        }
    }

    fn parse(self, content: &str) -> Result<Value, String> {
        match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Read and parse a YAML/TOML/JSON document into a JSON value.
pub fn load_document(path: &Path) -> Result<Value, ConfigurationError> {
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| {
        error!(error = ?source, config_path = ?path, "[CONFIG] Failed to read file");
        ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let document = format.parse(&content).map_err(|message| {
        error!(error = %message, config_path = ?path, ?format, "[CONFIG] Failed to parse file");
        ConfigurationError::Parse {
            path: path.to_path_buf(),
            message,
        }
    })?;
    debug!(config_path = ?path, ?format, "[CONFIG] Parsed document");
    Ok(document)
}

/// Settings a config file may provide. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub extractor_type: Option<String>,
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub output_pattern: Option<String>,
    #[serde(default)]
    pub options: ExtractorOptions,
}

impl ConfigFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        info!(config_path = ?path, "[CONFIG] Loading configuration from file");
        let document = load_document(path)?;
        // an empty YAML file parses to null
        let document = if document.is_null() {
            Value::Object(Default::default())
        } else {
            document
        };
        let config: ConfigFile =
            serde_json::from_value(document).map_err(|e| ConfigurationError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.trace_loaded(path);
        Ok(config)
    }

    fn trace_loaded(&self, path: &Path) {
        info!(
            config_path = ?path,
            source_name = self.source_name.as_deref().unwrap_or("-"),
            extractor_type = self.extractor_type.as_deref().unwrap_or("-"),
            options_count = self.options.len(),
            "[CONFIG] Loaded config"
        );
        debug!(?self, "[CONFIG] Config loaded (full debug)");
    }
}
