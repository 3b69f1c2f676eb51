//! Request templates.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::transport::HttpRequest;
use crate::{HttpClientError, Result};

/// Outgoing request before it is bound to a target.
///
/// Produced by the contract from an operation and its arguments, filled by
/// the encoder and then handed to each interceptor in order.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl RequestTemplate {
    /// Create a template for `method` and an already expanded path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Set a header, replacing any previous value. Invalid names or values
    /// are dropped with a warning.
    pub fn header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        match (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                tracing::warn!(header = name.as_ref(), "Dropping invalid request header");
            }
        }
        self
    }

    /// Append a query parameter. Values are encoded when the URL is built.
    pub fn query_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the raw body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// Set the body together with its content type.
    pub fn set_body_with_type(&mut self, body: impl Into<Bytes>, content_type: &'static str) -> &mut Self {
        self.headers
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.set_body(body)
    }

    /// Bind the template to a base URL. The path is appended to the base
    /// path rather than resolved against it, so `http://svc/api` and
    /// `/users` give `http://svc/api/users`.
    pub fn to_request(&self, base_url: &str) -> Result<HttpRequest> {
        let base = base_url.trim_end_matches('/');
        let joined = if self.path.is_empty() {
            base.to_string()
        } else if self.path.starts_with('/') {
            format!("{}{}", base, self.path)
        } else {
            format!("{}/{}", base, self.path)
        };

        let mut url =
            url::Url::parse(&joined).map_err(|e| HttpClientError::InvalidUrl(format!("{}: {}", joined, e)))?;

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(HttpRequest {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body: self.body.clone(),
        })
    }
}
