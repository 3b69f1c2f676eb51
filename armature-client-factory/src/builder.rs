//! Client builders.
//!
//! Both variants share [`ClientBuilder`]. Only [`WrappedClientBuilder`] can
//! bind a fallback, so a fallback on a plain client cannot be expressed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::client::{ClientProxy, Resilience};
use crate::codec::{Decoder, Encoder, JsonDecoder, JsonEncoder};
use crate::config::{LogLevel, TypeRef};
use crate::contract::{Contract, DefaultContract, MethodMetadata};
use crate::descriptor::ClientInterfaceDescriptor;
use crate::error_decoder::{DefaultErrorDecoder, ErrorDecoder};
use crate::fallback::{Fallback, FallbackComponent, FallbackFactory};
use crate::interceptor::RequestInterceptor;
use crate::logger::{ClientLogger, TracingLogger};
use crate::retry::{RetryPolicy, RetryPolicyDecision, RetryStrategy};
use crate::target::ResolvedTarget;
use crate::transport::{ReqwestTransport, RequestOptions, Transport};

/// Names of the components a client was assembled from.
///
/// Two builds from the same configuration produce equal profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientProfile {
    pub encoder: TypeRef,
    pub decoder: TypeRef,
    pub logger: TypeRef,
    pub log_level: LogLevel,
    pub contract: Option<TypeRef>,
    pub error_decoder: Option<TypeRef>,
    pub interceptors: Vec<TypeRef>,
    pub retry: RetryPolicyDecision,
    pub fallback: Option<TypeRef>,
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            encoder: TypeRef::new(TypeRef::JSON),
            decoder: TypeRef::new(TypeRef::JSON),
            logger: TypeRef::new(TypeRef::TRACING),
            log_level: LogLevel::None,
            contract: None,
            error_decoder: None,
            interceptors: Vec::new(),
            retry: RetryPolicyDecision::TransportDefault,
            fallback: None,
        }
    }
}

/// Components collected by a builder.
pub struct ClientParts {
    pub(crate) descriptor: Arc<ClientInterfaceDescriptor>,
    pub(crate) encoder: Arc<dyn Encoder>,
    pub(crate) decoder: Arc<dyn Decoder>,
    pub(crate) contract: Arc<dyn Contract>,
    pub(crate) methods: HashMap<String, MethodMetadata>,
    pub(crate) logger: Arc<dyn ClientLogger>,
    pub(crate) log_level: LogLevel,
    pub(crate) error_decoder: Arc<dyn ErrorDecoder>,
    pub(crate) interceptors: Vec<Arc<dyn RequestInterceptor>>,
    pub(crate) retry: Arc<dyn RetryStrategy>,
    pub(crate) options: RequestOptions,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) profile: ClientProfile,
}

impl ClientParts {
    fn new(descriptor: Arc<ClientInterfaceDescriptor>) -> Self {
        Self {
            descriptor,
            encoder: Arc::new(JsonEncoder),
            decoder: Arc::new(JsonDecoder),
            contract: Arc::new(DefaultContract),
            methods: HashMap::new(),
            logger: Arc::new(TracingLogger),
            log_level: LogLevel::None,
            error_decoder: Arc::new(DefaultErrorDecoder),
            interceptors: Vec::new(),
            retry: Arc::new(RetryPolicy::transport_default()),
            options: RequestOptions::default(),
            transport: None,
            profile: ClientProfile::default(),
        }
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(ReqwestTransport::default()),
        }
    }
}

/// Operations shared by both builder variants.
pub trait ClientBuilder: Sized {
    #[doc(hidden)]
    fn parts_mut(&mut self) -> &mut ClientParts;

    /// Finish the client with a direct target binding.
    fn target(self, target: ResolvedTarget) -> ClientProxy;

    fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.parts_mut().encoder = encoder;
        self
    }

    fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.parts_mut().decoder = decoder;
        self
    }

    /// Set the contract and the metadata it produced for each operation.
    fn contract(mut self, contract: Arc<dyn Contract>, methods: Vec<MethodMetadata>) -> Self {
        let parts = self.parts_mut();
        parts.contract = contract;
        parts.methods = methods
            .into_iter()
            .map(|m| (m.name().to_string(), m))
            .collect();
        self
    }

    fn logger(mut self, logger: Arc<dyn ClientLogger>, level: LogLevel) -> Self {
        let parts = self.parts_mut();
        parts.logger = logger;
        parts.log_level = level;
        self
    }

    fn error_decoder(mut self, decoder: Arc<dyn ErrorDecoder>) -> Self {
        self.parts_mut().error_decoder = decoder;
        self
    }

    /// Append an interceptor; interceptors run in the order added.
    fn interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.parts_mut().interceptors.push(interceptor);
        self
    }

    fn retry_strategy(mut self, retry: Arc<dyn RetryStrategy>) -> Self {
        self.parts_mut().retry = retry;
        self
    }

    fn options(mut self, options: RequestOptions) -> Self {
        self.parts_mut().options = options;
        self
    }

    fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.parts_mut().transport = Some(transport);
        self
    }

    fn profile(mut self, profile: ClientProfile) -> Self {
        self.parts_mut().profile = profile;
        self
    }
}

/// Builder for clients without circuit breaking.
pub struct PlainClientBuilder {
    parts: ClientParts,
}

impl PlainClientBuilder {
    pub fn new(descriptor: Arc<ClientInterfaceDescriptor>) -> Self {
        Self {
            parts: ClientParts::new(descriptor),
        }
    }
}

impl ClientBuilder for PlainClientBuilder {
    fn parts_mut(&mut self) -> &mut ClientParts {
        &mut self.parts
    }

    fn target(self, target: ResolvedTarget) -> ClientProxy {
        ClientProxy::assemble(self.parts, target, None)
    }
}

/// Builder for clients guarded by a circuit breaker, optionally with a
/// fallback.
pub struct WrappedClientBuilder {
    parts: ClientParts,
    circuit_breaker: CircuitBreakerConfig,
}

impl WrappedClientBuilder {
    pub fn new(descriptor: Arc<ClientInterfaceDescriptor>, circuit_breaker: CircuitBreakerConfig) -> Self {
        Self {
            parts: ClientParts::new(descriptor),
            circuit_breaker,
        }
    }

    /// Finish the client with a static fallback used for every failure.
    pub fn target_with_fallback(self, target: ResolvedTarget, fallback: Arc<dyn Fallback>) -> ClientProxy {
        self.finish(target, Some(FallbackComponent::Static(fallback)))
    }

    /// Finish the client with a fallback factory given each failure.
    pub fn target_with_fallback_factory(
        self,
        target: ResolvedTarget,
        factory: Arc<dyn FallbackFactory>,
    ) -> ClientProxy {
        self.finish(target, Some(FallbackComponent::Factory(factory)))
    }

    fn finish(self, target: ResolvedTarget, fallback: Option<FallbackComponent>) -> ClientProxy {
        let breaker = CircuitBreaker::new(target.interface().as_str(), self.circuit_breaker);
        ClientProxy::assemble(
            self.parts,
            target,
            Some(Resilience {
                breaker: Arc::new(breaker),
                fallback,
            }),
        )
    }
}

impl ClientBuilder for WrappedClientBuilder {
    fn parts_mut(&mut self) -> &mut ClientParts {
        &mut self.parts
    }

    fn target(self, target: ResolvedTarget) -> ClientProxy {
        self.finish(target, None)
    }
}

/// Builder picked by the resilience selector.
pub enum SelectedBuilder {
    Plain(PlainClientBuilder),
    Wrapped(WrappedClientBuilder),
}

impl SelectedBuilder {
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Self::Wrapped(_))
    }
}

impl ClientBuilder for SelectedBuilder {
    fn parts_mut(&mut self) -> &mut ClientParts {
        match self {
            Self::Plain(builder) => builder.parts_mut(),
            Self::Wrapped(builder) => builder.parts_mut(),
        }
    }

    fn target(self, target: ResolvedTarget) -> ClientProxy {
        match self {
            Self::Plain(builder) => builder.target(target),
            Self::Wrapped(builder) => builder.target(target),
        }
    }
}
