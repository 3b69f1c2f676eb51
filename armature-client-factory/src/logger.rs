//! Client exchange logging.

use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::LogLevel;
use crate::descriptor::InterfaceId;
use crate::transport::HttpRequest;
use crate::{HttpClientError, Response};

/// Records client exchanges at the endpoint's configured level.
pub trait ClientLogger: Send + Sync {
    fn log_request(&self, endpoint: &InterfaceId, level: LogLevel, request: &HttpRequest);

    fn log_response(&self, endpoint: &InterfaceId, level: LogLevel, response: &Response, elapsed: Duration);

    fn log_error(&self, endpoint: &InterfaceId, level: LogLevel, error: &HttpClientError, elapsed: Duration);

    fn log_retry(&self, endpoint: &InterfaceId, level: LogLevel, attempt: u32, delay: Duration);
}

/// Logger writing through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ClientLogger for TracingLogger {
    fn log_request(&self, endpoint: &InterfaceId, level: LogLevel, request: &HttpRequest) {
        if !level.is_enabled() {
            return;
        }

        debug!(
            endpoint = %endpoint,
            method = %request.method,
            url = %request.url,
            "Sending HTTP request"
        );

        if level.logs_headers() {
            for (name, value) in &request.headers {
                trace!(endpoint = %endpoint, header = %name, value = ?value, "Request header");
            }
        }

        if level.logs_bodies()
            && let Some(body) = &request.body
        {
            trace!(endpoint = %endpoint, body = %String::from_utf8_lossy(body), "Request body");
        }
    }

    fn log_response(&self, endpoint: &InterfaceId, level: LogLevel, response: &Response, elapsed: Duration) {
        if !level.is_enabled() {
            return;
        }

        debug!(
            endpoint = %endpoint,
            status = %response.status(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Received HTTP response"
        );

        if level.logs_headers() {
            for (name, value) in response.headers() {
                trace!(endpoint = %endpoint, header = %name, value = ?value, "Response header");
            }
        }

        if level.logs_bodies() {
            trace!(
                endpoint = %endpoint,
                body = %String::from_utf8_lossy(response.bytes()),
                "Response body"
            );
        }
    }

    fn log_error(&self, endpoint: &InterfaceId, level: LogLevel, error: &HttpClientError, elapsed: Duration) {
        if !level.is_enabled() {
            return;
        }

        warn!(
            endpoint = %endpoint,
            error = %error,
            elapsed_ms = elapsed.as_millis() as u64,
            "HTTP request failed"
        );
    }

    fn log_retry(&self, endpoint: &InterfaceId, level: LogLevel, attempt: u32, delay: Duration) {
        if !level.is_enabled() {
            return;
        }

        debug!(
            endpoint = %endpoint,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Retrying request"
        );
    }
}
