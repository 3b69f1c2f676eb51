//! # Armature Client Factory
//!
//! Declarative HTTP clients. A client interface is described once as a set
//! of request operations; each interface gets an endpoint configuration
//! block, and the factory assembles a ready-to-call [`ClientProxy`] from the
//! two.
//!
//! ## Features
//!
//! - **Target resolution**: literal base URLs or custom targets checked
//!   against the interface they serve
//! - **Retry policy resolution**: endpoint settings over global settings over
//!   the transport default, with conflicting settings rejected
//! - **Resilience wrapping**: circuit breaker and fallback, selected per
//!   endpoint (`AUTO`, `ENABLED`, `DISABLED`)
//! - **Pluggable components**: codecs, contract, logger, error decoder,
//!   interceptors and retryers looked up by name
//! - **Configuration files**: TOML or JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use armature_client_factory::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = ClientInterfaceDescriptor::new("users")
//!         .header("Accept: application/json")
//!         .operation(OperationDescriptor::new("get_user", "GET /users/{id}"));
//!
//!     let discovery = StaticDiscovery::new().register(users);
//!     let config = GlobalConfig::new().with_endpoint(
//!         "users",
//!         EndpointConfig::builder()
//!             .base_url("https://api.example.com")
//!             .retry(RetryParams::new(100, 1000, 3))
//!             .build(),
//!     );
//!
//!     let factory = ClientFactory::new(config, &discovery, ComponentRegistry::new());
//!     let client = factory.build(&InterfaceId::from("users"))?;
//!
//!     let user = client
//!         .invoke("get_user", &Arguments::new().param("id", 42))
//!         .await?;
//!     println!("{user}");
//!     Ok(())
//! }
//! ```
//!
//! ## With a Fallback
//!
//! ```rust,no_run
//! use armature_client_factory::prelude::*;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! let registry = ComponentRegistry::new().register_fallback("cached-users", || {
//!     Ok(Arc::new(|_op: &str, _args: &Arguments| -> armature_client_factory::Result<Value> {
//!         Ok(json!({"id": 0, "name": "anonymous"}))
//!     }))
//! });
//!
//! let config = GlobalConfig::new().with_endpoint(
//!     "users",
//!     EndpointConfig::builder()
//!         .base_url("https://api.example.com")
//!         .resilience_mode(ResilienceMode::Enabled)
//!         .fallback("cached-users")
//!         .build(),
//! );
//! # let _ = (registry, config);
//! ```

mod builder;
mod circuit_breaker;
mod client;
mod codec;
mod config;
mod contract;
mod descriptor;
mod error;
mod error_decoder;
mod factory;
mod fallback;
mod instantiate;
mod interceptor;
mod logger;
mod registry;
mod request;
mod resilience;
mod response;
mod retry;
mod target;
mod transport;

pub use builder::{
    ClientBuilder, ClientParts, ClientProfile, PlainClientBuilder, SelectedBuilder, WrappedClientBuilder,
};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::ClientProxy;
pub use codec::{Decoder, Encoder, FormEncoder, JsonDecoder, JsonEncoder, TextDecoder};
pub use config::{
    ConfigFormat, EndpointConfig, EndpointConfigBuilder, GlobalConfig, LogLevel, ResilienceMode, RetryParams,
    TimeUnit, TypeRef,
};
pub use contract::{Arguments, Contract, DefaultContract, MethodMetadata};
pub use descriptor::{ClientInterfaceDescriptor, Discovery, InterfaceId, OperationDescriptor, StaticDiscovery};
pub use error::{
    BoxError, ComponentKind, ConfigurationError, FactoryError, FactoryResult, HttpClientError, ResilienceError,
    Result, RetryScope,
};
pub use error_decoder::{DefaultErrorDecoder, ErrorDecoder};
pub use factory::{BuildReport, ClientFactory};
pub use fallback::{Fallback, FallbackComponent, FallbackFactory};
pub use instantiate::{ComponentRegistry, Instantiator};
pub use interceptor::{AuthInterceptor, HeaderInterceptor, RequestIdInterceptor, RequestInterceptor};
pub use logger::{ClientLogger, TracingLogger};
pub use registry::EndpointRegistry;
pub use request::RequestTemplate;
pub use resilience::{FeatureProbe, ResiliencePresence, ResilienceSelector, WrapperKind};
pub use response::Response;
pub use retry::{BackoffStrategy, RetryPolicy, RetryPolicyDecision, RetryStrategy};
pub use target::{ResolvedTarget, Target, UrlTarget};
pub use transport::{HttpRequest, ReqwestTransport, RequestOptions, Transport};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use armature_client_factory::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::ClientProxy;
    pub use crate::config::{EndpointConfig, GlobalConfig, LogLevel, ResilienceMode, RetryParams, TimeUnit, TypeRef};
    pub use crate::contract::Arguments;
    pub use crate::descriptor::{ClientInterfaceDescriptor, Discovery, InterfaceId, OperationDescriptor, StaticDiscovery};
    pub use crate::error::{FactoryError, HttpClientError};
    pub use crate::factory::{BuildReport, ClientFactory};
    pub use crate::fallback::{Fallback, FallbackFactory};
    pub use crate::instantiate::{ComponentRegistry, Instantiator};
    pub use crate::interceptor::RequestInterceptor;
    pub use crate::request::RequestTemplate;
    pub use crate::resilience::ResiliencePresence;
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}
