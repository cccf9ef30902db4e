//! Shared HTTP clients.
//!
//! Building a `reqwest::Client` sets up a connection pool and TLS state, so
//! backends borrow clients from a [`ClientRegistry`] instead of building one
//! each. The first caller for a given [`ClientKey`] builds the client; every
//! later caller gets a clone of the cached one (clones share the pool).

use once_cell::sync::Lazy;
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::error::ExtractionError;

/// Browser-like User-Agent sent by the web backend when no headers are set.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Everything that affects how a client is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    /// `(scheme, proxy url)` pairs, sorted by scheme.
    pub proxies: Vec<(String, String)>,
}

impl ClientKey {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            accept_invalid_certs: false,
            proxies: Vec::new(),
        }
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn proxies(mut self, proxies: &HashMap<String, String>) -> Self {
        let mut pairs: Vec<(String, String)> = proxies
            .iter()
            .map(|(scheme, url)| (scheme.to_ascii_lowercase(), url.clone()))
            .collect();
        pairs.sort();
        self.proxies = pairs;
        self
    }

    fn build(&self) -> Result<Client, ExtractionError> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        for (scheme, url) in &self.proxies {
            let proxy = match scheme.as_str() {
                "http" => Proxy::http(url),
                "https" => Proxy::https(url),
                _ => Proxy::all(url),
            }
            .map_err(ExtractionError::Client)?;
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(ExtractionError::Client)
    }
}

static GLOBAL: Lazy<Arc<ClientRegistry>> = Lazy::new(|| Arc::new(ClientRegistry::new()));

#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientKey, Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`ExtractorFactory::default`](crate::factory::ExtractorFactory).
    pub fn global() -> Arc<ClientRegistry> {
        GLOBAL.clone()
    }

    pub fn get_or_build(&self, key: &ClientKey) -> Result<Client, ExtractionError> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(key) {
            return Ok(client.clone());
        }
        let client = key.build()?;
        debug!(?key, "[CLIENT] Built shared HTTP client");
        clients.insert(key.clone(), client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_client_per_key() {
        let registry = ClientRegistry::new();
        let key = ClientKey::new(Duration::from_secs(30));

        registry.get_or_build(&key).unwrap();
        registry.get_or_build(&key).unwrap();
        assert_eq!(registry.len(), 1);

        let insecure = key.clone().accept_invalid_certs(true);
        registry.get_or_build(&insecure).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn proxy_order_does_not_change_the_key() {
        let mut a = HashMap::new();
        a.insert("https".to_string(), "http://proxy:1".to_string());
        a.insert("HTTP".to_string(), "http://proxy:2".to_string());
        let key = ClientKey::new(Duration::from_secs(5)).proxies(&a);
        assert_eq!(
            key.proxies,
            vec![
                ("http".to_string(), "http://proxy:2".to_string()),
                ("https".to_string(), "http://proxy:1".to_string()),
            ]
        );
    }
}
