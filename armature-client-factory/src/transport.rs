//! Wire transport seam and the reqwest-backed default.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

use crate::{HttpClientError, Response, Result};

/// Request bound to a concrete URL.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: url::Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Per-endpoint transport options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read timeout.
    pub read_timeout: Duration,
    /// Follow redirects.
    pub follow_redirects: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            follow_redirects: true,
        }
    }
}

/// Executes one HTTP exchange. Retries and fallbacks happen above this.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest, options: &RequestOptions) -> Result<Response>;
}

/// Transport over pooled `reqwest` clients.
///
/// Connect timeout and redirect policy are fixed when a reqwest client is
/// built, so one client is kept per distinct pair and picked per call. A
/// single transport can therefore be shared by endpoints with different
/// options.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    clients: RwLock<HashMap<ClientKey, reqwest::Client>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClientKey {
    connect_timeout: Duration,
    follow_redirects: bool,
}

impl From<&RequestOptions> for ClientKey {
    fn from(options: &RequestOptions) -> Self {
        Self {
            connect_timeout: options.connect_timeout,
            follow_redirects: options.follow_redirects,
        }
    }
}

impl ReqwestTransport {
    /// Create a transport with the client for `options` already built.
    pub fn new(options: &RequestOptions) -> std::result::Result<Self, reqwest::Error> {
        let transport = Self::default();
        transport.client(options)?;
        Ok(transport)
    }

    /// Number of distinct reqwest clients held.
    pub fn pooled_clients(&self) -> usize {
        self.clients.read().len()
    }

    fn client(&self, options: &RequestOptions) -> std::result::Result<reqwest::Client, reqwest::Error> {
        let key = ClientKey::from(options);
        if let Some(client) = self.clients.read().get(&key) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let redirect = if key.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .connect_timeout(key.connect_timeout)
            .redirect(redirect)
            .user_agent(format!("armature-client-factory/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()?;

        debug!(
            connect_timeout_ms = key.connect_timeout.as_millis() as u64,
            follow_redirects = key.follow_redirects,
            "Created pooled HTTP client"
        );
        clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest, options: &RequestOptions) -> Result<Response> {
        trace!(method = %request.method, url = %request.url, "Executing request");

        let mut builder = self
            .client(options)?
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(options.read_timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpClientError::Timeout(options.read_timeout)
            } else if e.is_connect() {
                HttpClientError::Connection(e.to_string())
            } else {
                HttpClientError::Http(e)
            }
        })?;

        Response::from_reqwest(response).await
    }
}
