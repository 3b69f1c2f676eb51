//! Error types for client assembly and client calls.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::TypeRef;
use crate::descriptor::InterfaceId;

/// Boxed error returned by pluggable collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for client calls.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Result type for client assembly.
pub type FactoryResult<T> = std::result::Result<T, FactoryError>;

/// Scope a retry setting was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryScope {
    /// Set on the endpoint block.
    Endpoint,
    /// Set on the global block.
    Global,
}

impl fmt::Display for RetryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Endpoint => f.write_str("endpoint"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Role of a pluggable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Encoder,
    Decoder,
    Contract,
    Logger,
    Target,
    Retryer,
    ErrorDecoder,
    Fallback,
    Interceptor,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Encoder => "encoder",
            Self::Decoder => "decoder",
            Self::Contract => "contract",
            Self::Logger => "logger",
            Self::Target => "target",
            Self::Retryer => "retryer",
            Self::ErrorDecoder => "error decoder",
            Self::Fallback => "fallback",
            Self::Interceptor => "interceptor",
        };
        f.write_str(name)
    }
}

/// Invalid or missing endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// No configuration block exists for the interface.
    #[error("No endpoint configuration for client interface {interface}")]
    MissingEndpoint {
        /// Requested interface.
        interface: InterfaceId,
    },

    /// The literal target has no usable base URL.
    #[error("Endpoint {interface} has no usable base URL: {reason}")]
    MissingBaseUrl {
        /// Interface being built.
        interface: InterfaceId,
        /// Why the URL was rejected.
        reason: String,
    },

    /// A custom target does not serve the interface being built.
    #[error("Target {target} does not serve client interface {interface}")]
    BadTargetClass {
        /// Configured target type.
        target: TypeRef,
        /// Interface being built.
        interface: InterfaceId,
    },

    /// Both `retryer` and `retry` are set on the same scope.
    #[error("Both a retryer and retry parameters are configured at {scope} scope")]
    ConflictingRetryConfig {
        /// Offending scope.
        scope: RetryScope,
    },

    /// Retry parameters are out of range.
    #[error("Invalid retry parameters at {scope} scope: {reason}")]
    InvalidRetry {
        /// Offending scope.
        scope: RetryScope,
        /// What is wrong.
        reason: String,
    },
}

/// Resilience wrapper could not be honoured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResilienceError {
    /// The endpoint needs a wrapped client but none can be built.
    #[error("Resilience runtime is not available for endpoint {endpoint}")]
    RuntimeNotPresent {
        /// Endpoint being built.
        endpoint: InterfaceId,
    },
}

/// Client assembly errors.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Configuration is missing or contradictory.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Resilience mode cannot be satisfied.
    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    /// A pluggable component failed to construct.
    #[error("Failed to instantiate {kind} {type_ref}: {source}")]
    Instantiation {
        /// Role that failed.
        kind: ComponentKind,
        /// Type that was requested.
        type_ref: TypeRef,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// Transport for the endpoint could not be created.
    #[error("Failed to create transport: {0}")]
    Transport(String),

    /// Configuration source could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl FactoryError {
    /// Wrap a collaborator failure for the given role.
    pub fn instantiation(kind: ComponentKind, type_ref: &TypeRef, source: BoxError) -> Self {
        Self::Instantiation {
            kind,
            type_ref: type_ref.clone(),
            source,
        }
    }

    /// Get the failing component role if this is an instantiation error.
    pub fn component_kind(&self) -> Option<ComponentKind> {
        match self {
            Self::Instantiation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Get the configuration error, if any.
    pub fn as_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            Self::Configuration(e) => Some(e),
            _ => None,
        }
    }

    /// Get the resilience error, if any.
    pub fn as_resilience(&self) -> Option<&ResilienceError> {
        match self {
            Self::Resilience(e) => Some(e),
            _ => None,
        }
    }
}

/// HTTP client call errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Request failed after all retries exhausted.
    #[error("Request failed after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Failure of the last attempt.
        #[source]
        last: Box<HttpClientError>,
    },

    /// Circuit breaker is open, rejecting requests.
    #[error("Circuit breaker for {endpoint} is open, request rejected")]
    CircuitOpen {
        /// Endpoint whose circuit is open.
        endpoint: String,
    },

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request template could not be expanded.
    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// Operation is not declared on the client interface.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Non-success response.
    #[error("Response error: {status} - {message}")]
    Response {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Failure the error decoder marked as worth retrying.
    #[error("Retryable error: {message}")]
    Retryable {
        /// HTTP status code, when the failure came from a response.
        status: Option<u16>,
        /// Error message.
        message: String,
        /// Server supplied delay before the next attempt.
        retry_after: Option<Duration>,
    },

    /// Body encoding or decoding error.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl HttpClientError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) | Self::Retryable { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            Self::RetryExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_)) || matches!(self, Self::Http(e) if e.is_connect())
    }

    /// Get the HTTP status code if the failure came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Retryable { status, .. } => *status,
            Self::RetryExhausted { last, .. } => last.status_code(),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
