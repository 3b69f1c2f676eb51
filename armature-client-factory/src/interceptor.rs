//! Request interceptors.
//!
//! Interceptors run in declared order on every attempt, after the body is
//! encoded and before the template is bound to the target. They can inspect
//! and mutate the template but cannot abort the call.

use base64::Engine;

use crate::RequestTemplate;

/// Mutates the outgoing request template.
pub trait RequestInterceptor: Send + Sync {
    fn apply(&self, template: &mut RequestTemplate);
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut RequestTemplate) + Send + Sync,
{
    fn apply(&self, template: &mut RequestTemplate) {
        self(template)
    }
}

/// Authentication interceptor that adds auth headers.
pub struct AuthInterceptor {
    auth_type: AuthType,
}

enum AuthType {
    Bearer(String),
    Basic { username: String, password: String },
    ApiKey { header: String, key: String },
}

impl AuthInterceptor {
    /// Create a bearer token interceptor.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Bearer(token.into()),
        }
    }

    /// Create a basic auth interceptor.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Basic {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// Create an API key interceptor.
    pub fn api_key(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::ApiKey {
                header: header.into(),
                key: key.into(),
            },
        }
    }
}

impl RequestInterceptor for AuthInterceptor {
    fn apply(&self, template: &mut RequestTemplate) {
        match &self.auth_type {
            AuthType::Bearer(token) => {
                template.header("authorization", format!("Bearer {}", token));
            }
            AuthType::Basic { username, password } => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                template.header("authorization", format!("Basic {}", credentials));
            }
            AuthType::ApiKey { header, key } => {
                template.header(header, key);
            }
        }
    }
}

/// Adds a fixed header to every request.
pub struct HeaderInterceptor {
    name: String,
    value: String,
}

impl HeaderInterceptor {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl RequestInterceptor for HeaderInterceptor {
    fn apply(&self, template: &mut RequestTemplate) {
        template.header(&self.name, &self.value);
    }
}

/// Adds a unique request ID to each attempt.
pub struct RequestIdInterceptor {
    header_name: String,
}

impl RequestIdInterceptor {
    pub fn new() -> Self {
        Self {
            header_name: "X-Request-ID".to_string(),
        }
    }

    /// Create with a custom header name.
    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header_name: header.into(),
        }
    }
}

impl Default for RequestIdInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestInterceptor for RequestIdInterceptor {
    fn apply(&self, template: &mut RequestTemplate) {
        let request_id = format!(
            "{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        template.header(&self.header_name, request_id);
    }
}
