use crate::{ClientError, Result};
use gobana_core::{ConnectionConfig, Transport};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as HttpClient, Method};
use serde_json::{Map, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_IDLE_PER_HOST: usize = 100;

/// Connection to an Elasticsearch REST API
pub struct Connection {
    base_url: String,
    user: Option<String>,
    password: String,
    client: HttpClient,
}

impl Connection {
    /// Create a connection; no request is made until the first call
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let protocol = if config.use_ssl { "https" } else { "http" };
        let base_url = format!("{}://{}:{}", protocol, config.host, config.port);

        let mut builder = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST);

        if !config.validate_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        // Only the configured proxy is used, never the environment's
        if config.proxy.is_empty() {
            builder = builder.no_proxy();
        } else {
            let url = proxy_url(&config.proxy, config.proxy_is_socks);
            let proxy = reqwest::Proxy::all(&url).map_err(|source| {
                tracing::error!(url = %url, error = %source, "Can't use proxy");
                ClientError::InvalidProxy {
                    proxy: config.proxy.clone(),
                    source,
                }
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        tracing::debug!(
            protocol,
            host = %config.host,
            port = config.port,
            user = %config.user,
            validate_ssl = config.validate_ssl,
            proxy = %config.proxy,
            proxy_is_socks = config.proxy_is_socks,
            base_url = %base_url,
            "Elasticsearch connection initialized"
        );

        Ok(Self {
            base_url,
            user: if config.user.is_empty() {
                None
            } else {
                Some(config.user.clone())
            },
            password: config.password.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `endpoint`, returning the raw body
    pub async fn get(&self, endpoint: &str) -> Result<Vec<u8>> {
        self.request(Method::GET, endpoint, None).await
    }

    /// POST `body` to `endpoint`, returning the raw body
    pub async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    /// PUT `body` to `endpoint`, returning the raw body
    pub async fn put(&self, endpoint: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    /// DELETE `endpoint`, returning the raw body
    pub async fn delete(&self, endpoint: &str) -> Result<Vec<u8>> {
        self.request(Method::DELETE, endpoint, None).await
    }

    pub async fn get_json(&self, endpoint: &str) -> Result<Map<String, Value>> {
        to_json(&self.get(endpoint).await?)
    }

    pub async fn post_json(&self, endpoint: &str, body: Vec<u8>) -> Result<Map<String, Value>> {
        to_json(&self.post(endpoint, body).await?)
    }

    pub async fn put_json(&self, endpoint: &str, body: Vec<u8>) -> Result<Map<String, Value>> {
        to_json(&self.put(endpoint, body).await?)
    }

    pub async fn delete_json(&self, endpoint: &str) -> Result<Map<String, Value>> {
        to_json(&self.delete(endpoint).await?)
    }

    async fn request(&self, method: Method, endpoint: &str, body: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(method = %method, url = %url, "Sending request");

        let mut request = self
            .client
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(user) = &self.user {
            request = request.basic_auth(user, Some(&self.password));
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        tracing::debug!(status = status.as_u16(), bytes = bytes.len(), "Received response");

        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl Transport for Connection {
    async fn post(&self, path: &str, body: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(self.request(Method::POST, path, Some(body.to_vec())).await?)
    }
}

/// SOCKS proxies are given as `host:port`; names resolve on the proxy side
fn proxy_url(proxy: &str, is_socks: bool) -> String {
    if is_socks && !proxy.contains("://") {
        format!("socks5h://{}", proxy)
    } else {
        proxy.to_string()
    }
}

/// Parse a response body that must be a JSON object
pub fn to_json(body: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(ClientError::InvalidResponse),
    }
}
