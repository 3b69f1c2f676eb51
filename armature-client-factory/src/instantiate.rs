//! Construction of pluggable components.
//!
//! The factory never builds collaborators itself. It asks an
//! [`Instantiator`] for each role by [`TypeRef`] and reports failures as
//! instantiation errors of that role.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::codec::{Decoder, Encoder, FormEncoder, JsonDecoder, JsonEncoder, TextDecoder};
use crate::config::TypeRef;
use crate::contract::{Contract, DefaultContract};
use crate::error::{BoxError, ComponentKind};
use crate::error_decoder::{DefaultErrorDecoder, ErrorDecoder};
use crate::fallback::{Fallback, FallbackComponent, FallbackFactory};
use crate::interceptor::{RequestIdInterceptor, RequestInterceptor};
use crate::logger::{ClientLogger, TracingLogger};
use crate::retry::{RetryPolicy, RetryStrategy};
use crate::target::Target;

/// Creates component instances from type references.
pub trait Instantiator: Send + Sync {
    fn encoder(&self, type_ref: &TypeRef) -> Result<Arc<dyn Encoder>, BoxError>;

    fn decoder(&self, type_ref: &TypeRef) -> Result<Arc<dyn Decoder>, BoxError>;

    fn contract(&self, type_ref: &TypeRef) -> Result<Arc<dyn Contract>, BoxError>;

    fn logger(&self, type_ref: &TypeRef) -> Result<Arc<dyn ClientLogger>, BoxError>;

    fn target(&self, type_ref: &TypeRef) -> Result<Arc<dyn Target>, BoxError>;

    fn retryer(&self, type_ref: &TypeRef) -> Result<Arc<dyn RetryStrategy>, BoxError>;

    fn error_decoder(&self, type_ref: &TypeRef) -> Result<Arc<dyn ErrorDecoder>, BoxError>;

    /// Create a fallback. Names registered as fallback factories come back
    /// as [`FallbackComponent::Factory`].
    fn fallback(&self, type_ref: &TypeRef) -> Result<FallbackComponent, BoxError>;

    fn interceptor(&self, type_ref: &TypeRef) -> Result<Arc<dyn RequestInterceptor>, BoxError>;
}

type Constructor<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

struct Constructors<T> {
    kind: ComponentKind,
    entries: HashMap<TypeRef, Constructor<T>>,
}

impl<T> Constructors<T> {
    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    fn insert(&mut self, name: TypeRef, ctor: Constructor<T>) {
        self.entries.insert(name, ctor);
    }

    fn create(&self, type_ref: &TypeRef) -> Result<T, BoxError> {
        match self.entries.get(type_ref) {
            Some(ctor) => ctor(),
            None => Err(format!("No {} registered under {:?}", self.kind, type_ref.as_str()).into()),
        }
    }

    fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(TypeRef::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<T> Clone for Constructors<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            entries: self.entries.clone(),
        }
    }
}

/// [`Instantiator`] backed by named constructors.
///
/// Constructors run on every request, so each build gets fresh instances
/// unless the constructor hands out a shared `Arc`.
///
/// ```
/// use armature_client_factory::{ComponentRegistry, HeaderInterceptor};
/// use std::sync::Arc;
///
/// let registry = ComponentRegistry::new()
///     .register_interceptor("tenant", || Ok(Arc::new(HeaderInterceptor::new("X-Tenant", "acme"))));
/// ```
#[derive(Clone)]
pub struct ComponentRegistry {
    encoders: Constructors<Arc<dyn Encoder>>,
    decoders: Constructors<Arc<dyn Decoder>>,
    contracts: Constructors<Arc<dyn Contract>>,
    loggers: Constructors<Arc<dyn ClientLogger>>,
    targets: Constructors<Arc<dyn Target>>,
    retryers: Constructors<Arc<dyn RetryStrategy>>,
    error_decoders: Constructors<Arc<dyn ErrorDecoder>>,
    fallbacks: Constructors<FallbackComponent>,
    interceptors: Constructors<Arc<dyn RequestInterceptor>>,
}

impl ComponentRegistry {
    /// Create a registry holding the built-in components.
    pub fn new() -> Self {
        Self::empty()
            .register_encoder(TypeRef::JSON, || Ok(Arc::new(JsonEncoder)))
            .register_encoder("form", || Ok(Arc::new(FormEncoder)))
            .register_decoder(TypeRef::JSON, || Ok(Arc::new(JsonDecoder)))
            .register_decoder("text", || Ok(Arc::new(TextDecoder)))
            .register_logger(TypeRef::TRACING, || Ok(Arc::new(TracingLogger)))
            .register_contract(TypeRef::DEFAULT, || Ok(Arc::new(DefaultContract)))
            .register_error_decoder(TypeRef::DEFAULT, || Ok(Arc::new(DefaultErrorDecoder)))
            .register_retryer(TypeRef::DEFAULT, || Ok(Arc::new(RetryPolicy::transport_default())))
            .register_retryer("never", || Ok(Arc::new(RetryPolicy::never())))
            .register_interceptor("request-id", || Ok(Arc::new(RequestIdInterceptor::new())))
    }

    /// Create a registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            encoders: Constructors::new(ComponentKind::Encoder),
            decoders: Constructors::new(ComponentKind::Decoder),
            contracts: Constructors::new(ComponentKind::Contract),
            loggers: Constructors::new(ComponentKind::Logger),
            targets: Constructors::new(ComponentKind::Target),
            retryers: Constructors::new(ComponentKind::Retryer),
            error_decoders: Constructors::new(ComponentKind::ErrorDecoder),
            fallbacks: Constructors::new(ComponentKind::Fallback),
            interceptors: Constructors::new(ComponentKind::Interceptor),
        }
    }

    pub fn register_encoder<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Encoder>, BoxError> + Send + Sync + 'static,
    {
        self.encoders.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn register_decoder<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Decoder>, BoxError> + Send + Sync + 'static,
    {
        self.decoders.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn register_contract<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Contract>, BoxError> + Send + Sync + 'static,
    {
        self.contracts.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn register_logger<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ClientLogger>, BoxError> + Send + Sync + 'static,
    {
        self.loggers.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn register_target<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Target>, BoxError> + Send + Sync + 'static,
    {
        self.targets.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn register_retryer<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn RetryStrategy>, BoxError> + Send + Sync + 'static,
    {
        self.retryers.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn register_error_decoder<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ErrorDecoder>, BoxError> + Send + Sync + 'static,
    {
        self.error_decoders.insert(name.into(), Arc::new(ctor));
        self
    }

    /// Register a static fallback.
    pub fn register_fallback<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Fallback>, BoxError> + Send + Sync + 'static,
    {
        self.fallbacks.insert(
            name.into(),
            Arc::new(move || ctor().map(FallbackComponent::Static)),
        );
        self
    }

    /// Register a fallback factory that receives the failure cause.
    pub fn register_fallback_factory<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn FallbackFactory>, BoxError> + Send + Sync + 'static,
    {
        self.fallbacks.insert(
            name.into(),
            Arc::new(move || ctor().map(FallbackComponent::Factory)),
        );
        self
    }

    pub fn register_interceptor<F>(mut self, name: impl Into<TypeRef>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn RequestInterceptor>, BoxError> + Send + Sync + 'static,
    {
        self.interceptors.insert(name.into(), Arc::new(ctor));
        self
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("encoders", &self.encoders.names())
            .field("decoders", &self.decoders.names())
            .field("contracts", &self.contracts.names())
            .field("loggers", &self.loggers.names())
            .field("targets", &self.targets.names())
            .field("retryers", &self.retryers.names())
            .field("error_decoders", &self.error_decoders.names())
            .field("fallbacks", &self.fallbacks.names())
            .field("interceptors", &self.interceptors.names())
            .finish()
    }
}

impl Instantiator for ComponentRegistry {
    fn encoder(&self, type_ref: &TypeRef) -> Result<Arc<dyn Encoder>, BoxError> {
        self.encoders.create(type_ref)
    }

    fn decoder(&self, type_ref: &TypeRef) -> Result<Arc<dyn Decoder>, BoxError> {
        self.decoders.create(type_ref)
    }

    fn contract(&self, type_ref: &TypeRef) -> Result<Arc<dyn Contract>, BoxError> {
        self.contracts.create(type_ref)
    }

    fn logger(&self, type_ref: &TypeRef) -> Result<Arc<dyn ClientLogger>, BoxError> {
        self.loggers.create(type_ref)
    }

    fn target(&self, type_ref: &TypeRef) -> Result<Arc<dyn Target>, BoxError> {
        self.targets.create(type_ref)
    }

    fn retryer(&self, type_ref: &TypeRef) -> Result<Arc<dyn RetryStrategy>, BoxError> {
        self.retryers.create(type_ref)
    }

    fn error_decoder(&self, type_ref: &TypeRef) -> Result<Arc<dyn ErrorDecoder>, BoxError> {
        self.error_decoders.create(type_ref)
    }

    fn fallback(&self, type_ref: &TypeRef) -> Result<FallbackComponent, BoxError> {
        self.fallbacks.create(type_ref)
    }

    fn interceptor(&self, type_ref: &TypeRef) -> Result<Arc<dyn RequestInterceptor>, BoxError> {
        self.interceptors.create(type_ref)
    }
}
