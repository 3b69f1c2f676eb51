//! Fallbacks for wrapped clients.
//!
//! A fallback answers an operation when the remote call fails for good:
//! transport errors, non-success statuses once retries are spent, decode
//! errors and an open circuit.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::contract::Arguments;
use crate::{HttpClientError, Result};

/// Alternate implementation of a client interface.
pub trait Fallback: Send + Sync {
    /// Answer `operation` in place of the remote service.
    fn invoke(&self, operation: &str, arguments: &Arguments) -> Result<Value>;
}

impl<F> Fallback for F
where
    F: Fn(&str, &Arguments) -> Result<Value> + Send + Sync,
{
    fn invoke(&self, operation: &str, arguments: &Arguments) -> Result<Value> {
        self(operation, arguments)
    }
}

/// Produces a fallback for the failure that triggered it.
pub trait FallbackFactory: Send + Sync {
    fn create(&self, cause: &HttpClientError) -> Arc<dyn Fallback>;
}

/// Fallback bound to a wrapped client.
#[derive(Clone)]
pub enum FallbackComponent {
    /// Created once and used for every failure.
    Static(Arc<dyn Fallback>),
    /// Asked for a fallback on every failure.
    Factory(Arc<dyn FallbackFactory>),
}

impl FallbackComponent {
    /// Get the fallback handling `cause`.
    pub fn resolve(&self, cause: &HttpClientError) -> Arc<dyn Fallback> {
        match self {
            Self::Static(fallback) => Arc::clone(fallback),
            Self::Factory(factory) => factory.create(cause),
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, Self::Factory(_))
    }
}

impl fmt::Debug for FallbackComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("FallbackComponent::Static"),
            Self::Factory(_) => f.write_str("FallbackComponent::Factory"),
        }
    }
}
