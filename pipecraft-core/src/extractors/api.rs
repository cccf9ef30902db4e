//! JSON API backend.
//!
//! Sends one request per record to `base_url` (with `$name` placeholders
//! filled from the record). POST, PUT and PATCH carry `payload` as a JSON
//! body; other methods send `params` as the query string. The response must be
//! JSON and is returned pretty-printed.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};

use super::client::{ClientKey, ClientRegistry};
use super::{
    build_headers, default_max_retries, default_timeout, parse_options, request_delay, CookieSource,
};
use crate::contract::{BatchPolicy, Extractor};
use crate::error::{ConfigurationError, ExtractionError, PipelineError};
use crate::factory::{AuthCallback, ExtractorOptions};
use crate::record::ParameterRecord;
use crate::template::safe_substitute;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiExtractorOptions {
    #[serde(default)]
    pub source_name: Option<String>,
    /// Request URL. Falls back to `url_template` when absent.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub cookies: Option<CookieSource>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub params: Option<HashMap<String, String>>,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    /// Scheme (`http`, `https`, `all`) → proxy URL.
    #[serde(default)]
    pub proxy: Option<HashMap<String, String>>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub delay_between_requests: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_verify_ssl() -> bool {
    true
}

pub struct ApiExtractor {
    source_name: Option<String>,
    base_url: String,
    method: Method,
    headers: HeaderMap,
    payload: Option<Value>,
    params: Option<HashMap<String, String>>,
    policy: BatchPolicy,
    client: Client,
}

impl ApiExtractor {
    pub fn from_options(
        options: &ExtractorOptions,
        clients: &ClientRegistry,
        auth_callback: Option<&AuthCallback>,
    ) -> Result<Self, PipelineError> {
        let options: ApiExtractorOptions = parse_options("api", options)?;
        Self::new(options, clients, auth_callback)
    }

    pub fn new(
        options: ApiExtractorOptions,
        clients: &ClientRegistry,
        auth_callback: Option<&AuthCallback>,
    ) -> Result<Self, PipelineError> {
        let invalid = |message: String| ConfigurationError::InvalidOptions {
            backend: "api",
            message,
        };

        let base_url = options
            .base_url
            .or(options.url_template)
            .ok_or_else(|| invalid("base_url (or url_template) is required".to_string()))?;
        let method = Method::from_bytes(options.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| invalid(format!("method {:?}: {e}", options.method)))?;
        let delay = request_delay("api", options.delay_between_requests)?;

        let cookies = match &options.cookies {
            Some(source) => source.resolve()?,
            None => None,
        };
        let mut headers = build_headers("api", &options.headers, cookies.as_ref())?;

        if let Some(callback) = auth_callback {
            let token = callback().map_err(|e| {
                error!(error = %e, "[API] Auth callback failed");
                e
            })?;
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ExtractionError::Auth(format!("token is not a valid header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut key = ClientKey::new(Duration::from_secs(options.timeout))
            .accept_invalid_certs(!options.verify_ssl);
        if let Some(proxy) = &options.proxy {
            key = key.proxies(proxy);
        }
        let client = clients.get_or_build(&key)?;

        info!(
            source_name = options.source_name.as_deref().unwrap_or("-"),
            base_url = %base_url,
            method = %method,
            authenticated = headers.contains_key(AUTHORIZATION),
            "[API] Extractor ready"
        );
        Ok(Self {
            source_name: options.source_name,
            base_url,
            method,
            headers,
            payload: options.payload,
            params: options.params,
            policy: BatchPolicy {
                delay,
                max_retries: options.max_retries,
            },
            client,
        })
    }

    pub fn url_for(&self, params: &ParameterRecord) -> String {
        safe_substitute(&self.base_url, params)
    }

    fn sends_body(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

#[async_trait]
impl Extractor for ApiExtractor {
    async fn extract(&self, params: &ParameterRecord) -> Result<String, ExtractionError> {
        let url = self.url_for(params);
        debug!(
            source_name = self.source_name.as_deref().unwrap_or("-"),
            url = %url,
            method = %self.method,
            "[API] Sending request"
        );

        let mut request = self
            .client
            .request(self.method.clone(), &url)
            .headers(self.headers.clone());
        if self.sends_body() {
            if let Some(payload) = &self.payload {
                request = request.json(payload);
            }
        } else if let Some(query) = &self.params {
            request = request.query(query);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ExtractionError::Request {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Status { url, status });
        }

        let body = response
            .text()
            .await
            .map_err(|source| ExtractionError::Request {
                url: url.clone(),
                source,
            })?;
        let document: Value = serde_json::from_str(&body).map_err(|e| ExtractionError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        serde_json::to_string_pretty(&document).map_err(|e| ExtractionError::Decode {
            url,
            message: e.to_string(),
        })
    }

    fn batch_policy(&self) -> BatchPolicy {
        self.policy
    }
}
