//! HTTP response wrapper.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, SystemTime};

use crate::{HttpClientError, Result};

/// Fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: url::Url,
}

impl Response {
    /// Create a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>, url: url::Url) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            url,
        }
    }

    /// Create a response from a reqwest response, buffering the body.
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        Ok(Self {
            status,
            headers,
            body,
            url,
        })
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the response URL.
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Get the response body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Get the response body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpClientError::Codec(e.to_string()))
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpClientError::Codec(e.to_string()))
    }

    /// Delay requested through `Retry-After`.
    ///
    /// Accepts delta-seconds and HTTP-date values. A date in the past means
    /// no wait.
    pub fn retry_after(&self) -> Option<Duration> {
        let value = self.header(http::header::RETRY_AFTER.as_str())?.trim();
        if let Ok(seconds) = value.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }

        let date = httpdate::parse_http_date(value).ok()?;
        Some(date.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
    }

    /// Status reason phrase, or the numeric code when unknown.
    pub fn reason(&self) -> String {
        self.status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| self.status.as_u16().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&'static str, &'static str)], body: &'static str) -> Response {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, http::HeaderValue::from_static(value));
        }
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            map,
            body,
            url::Url::parse("http://svc/x").unwrap(),
        )
    }

    #[test]
    fn test_retry_after_seconds() {
        let r = response(503, &[("retry-after", "2")], "");
        assert_eq!(r.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(response(503, &[], "").retry_after(), None);
    }

    #[test]
    fn test_retry_after_http_date() {
        let later = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(120));
        let mut headers = HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, later.parse().unwrap());
        let r = Response::new(
            StatusCode::SERVICE_UNAVAILABLE,
            headers,
            "",
            url::Url::parse("http://svc/x").unwrap(),
        );

        let delay = r.retry_after().unwrap();
        assert!(delay > Duration::from_secs(100) && delay <= Duration::from_secs(120));

        let past = response(503, &[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")], "");
        assert_eq!(past.retry_after(), Some(Duration::ZERO));
        assert_eq!(response(503, &[("retry-after", "soon")], "").retry_after(), None);
    }

    #[test]
    fn test_json_body() {
        let r = response(200, &[], r#"{"id": 7}"#);
        let value: serde_json::Value = r.json().unwrap();
        assert_eq!(value["id"], 7);
        assert!(r.is_success());
    }

    #[test]
    fn test_reason() {
        assert_eq!(response(404, &[], "").reason(), "Not Found");
    }
}
