//! Web page backend: one GET per record against a URL template.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::client::{ClientKey, ClientRegistry, DEFAULT_USER_AGENT};
use super::{
    build_headers, default_max_retries, default_timeout, parse_options, request_delay, CookieSource,
};
use crate::contract::{BatchPolicy, Extractor};
use crate::error::{ExtractionError, PipelineError};
use crate::factory::ExtractorOptions;
use crate::record::ParameterRecord;
use crate::template::safe_substitute;

#[derive(Debug, Clone, Deserialize)]
pub struct WebExtractorOptions {
    #[serde(default)]
    pub source_name: Option<String>,
    pub url_template: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub cookies: Option<CookieSource>,
    /// Seconds to wait after each successful request.
    #[serde(default = "default_delay")]
    pub delay_between_requests: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_delay() -> f64 {
    1.0
}

pub struct WebExtractor {
    source_name: Option<String>,
    url_template: String,
    headers: HeaderMap,
    policy: BatchPolicy,
    client: Client,
}

impl WebExtractor {
    pub fn from_options(
        options: &ExtractorOptions,
        clients: &ClientRegistry,
    ) -> Result<Self, PipelineError> {
        let options: WebExtractorOptions = parse_options("web", options)?;
        Self::new(options, clients)
    }

    pub fn new(options: WebExtractorOptions, clients: &ClientRegistry) -> Result<Self, PipelineError> {
        let delay = request_delay("web", options.delay_between_requests)?;

        let headers = options.headers.unwrap_or_else(|| {
            HashMap::from([("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string())])
        });
        let cookies = match &options.cookies {
            Some(source) => source.resolve()?,
            None => None,
        };
        let headers = build_headers("web", &headers, cookies.as_ref())?;
        let client = clients.get_or_build(&ClientKey::new(Duration::from_secs(options.timeout)))?;

        info!(
            source_name = options.source_name.as_deref().unwrap_or("-"),
            url_template = %options.url_template,
            "[WEB] Extractor ready"
        );
        Ok(Self {
            source_name: options.source_name,
            url_template: options.url_template,
            headers,
            policy: BatchPolicy {
                delay,
                max_retries: options.max_retries,
            },
            client,
        })
    }

    pub fn url_for(&self, params: &ParameterRecord) -> String {
        safe_substitute(&self.url_template, params)
    }
}

#[async_trait]
impl Extractor for WebExtractor {
    async fn extract(&self, params: &ParameterRecord) -> Result<String, ExtractionError> {
        let url = self.url_for(params);
        debug!(
            source_name = self.source_name.as_deref().unwrap_or("-"),
            url = %url,
            "[WEB] Fetching page"
        );

        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
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
        response
            .text()
            .await
            .map_err(|source| ExtractionError::Request { url, source })
    }

    fn batch_policy(&self) -> BatchPolicy {
        self.policy
    }
}
