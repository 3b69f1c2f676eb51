//! Mapping of non-success responses to errors.

use http::StatusCode;

use crate::{HttpClientError, Response};

/// Turns a non-2xx response into the error the call fails with.
///
/// Returning [`HttpClientError::Retryable`] hands the failure to the
/// endpoint's retry strategy.
pub trait ErrorDecoder: Send + Sync {
    fn decode(&self, operation: &str, response: &Response) -> HttpClientError;
}

/// Retries only when the server asks for it with `Retry-After`, or answers
/// 503.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorDecoder;

impl ErrorDecoder for DefaultErrorDecoder {
    fn decode(&self, operation: &str, response: &Response) -> HttpClientError {
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        let message = if body.is_empty() {
            format!("{} on {}", response.reason(), operation)
        } else {
            format!("{} on {}: {}", response.reason(), operation, body)
        };

        let retry_after = response.retry_after();
        if retry_after.is_some() || response.status() == StatusCode::SERVICE_UNAVAILABLE {
            HttpClientError::Retryable {
                status: Some(status),
                message,
                retry_after,
            }
        } else {
            HttpClientError::Response { status, message }
        }
    }
}
