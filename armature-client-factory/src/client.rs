//! Client proxy.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::builder::{ClientParts, ClientProfile};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::codec::{Decoder, Encoder};
use crate::config::LogLevel;
use crate::contract::{Arguments, Contract, MethodMetadata};
use crate::descriptor::{ClientInterfaceDescriptor, InterfaceId};
use crate::error_decoder::ErrorDecoder;
use crate::fallback::FallbackComponent;
use crate::interceptor::RequestInterceptor;
use crate::logger::ClientLogger;
use crate::retry::RetryStrategy;
use crate::target::ResolvedTarget;
use crate::transport::{RequestOptions, Transport};
use crate::{HttpClientError, Result};

pub(crate) struct Resilience {
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) fallback: Option<FallbackComponent>,
}

struct ClientInner {
    descriptor: Arc<ClientInterfaceDescriptor>,
    target: ResolvedTarget,
    encoder: Arc<dyn Encoder>,
    decoder: Arc<dyn Decoder>,
    contract: Arc<dyn Contract>,
    methods: std::collections::HashMap<String, MethodMetadata>,
    logger: Arc<dyn ClientLogger>,
    log_level: LogLevel,
    error_decoder: Arc<dyn ErrorDecoder>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
    retry: Arc<dyn RetryStrategy>,
    options: RequestOptions,
    transport: Arc<dyn Transport>,
    resilience: Option<Resilience>,
    profile: ClientProfile,
}

/// Assembled client for one client interface.
///
/// Operations are invoked by name. Cloning is cheap and clones share the
/// transport and circuit breaker.
#[derive(Clone)]
pub struct ClientProxy {
    inner: Arc<ClientInner>,
}

impl ClientProxy {
    pub(crate) fn assemble(parts: ClientParts, target: ResolvedTarget, resilience: Option<Resilience>) -> Self {
        let transport = parts.transport();
        let ClientParts {
            descriptor,
            encoder,
            decoder,
            contract,
            methods,
            logger,
            log_level,
            error_decoder,
            interceptors,
            retry,
            options,
            profile,
            ..
        } = parts;

        Self {
            inner: Arc::new(ClientInner {
                descriptor,
                target,
                encoder,
                decoder,
                contract,
                methods,
                logger,
                log_level,
                error_decoder,
                interceptors,
                retry,
                options,
                transport,
                resilience,
                profile,
            }),
        }
    }

    /// Client interface this proxy implements.
    pub fn interface(&self) -> &InterfaceId {
        self.inner.descriptor.id()
    }

    pub fn descriptor(&self) -> &ClientInterfaceDescriptor {
        &self.inner.descriptor
    }

    pub fn target(&self) -> &ResolvedTarget {
        &self.inner.target
    }

    /// Names of the components this client was assembled from.
    pub fn profile(&self) -> &ClientProfile {
        &self.inner.profile
    }

    pub fn options(&self) -> &RequestOptions {
        &self.inner.options
    }

    /// Check if calls go through a circuit breaker.
    pub fn is_wrapped(&self) -> bool {
        self.inner.resilience.is_some()
    }

    /// Check if a fallback is bound.
    pub fn has_fallback(&self) -> bool {
        self.inner
            .resilience
            .as_ref()
            .is_some_and(|r| r.fallback.is_some())
    }

    /// State of the circuit breaker of a wrapped client.
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.inner.resilience.as_ref().map(|r| r.breaker.state())
    }

    /// Invoke `operation` and decode the result into `T`.
    pub async fn call<T: DeserializeOwned>(&self, operation: &str, args: &Arguments) -> Result<T> {
        let value = self.invoke(operation, args).await?;
        serde_json::from_value(value).map_err(|e| HttpClientError::Codec(e.to_string()))
    }

    /// Invoke `operation` with `args`.
    pub async fn invoke(&self, operation: &str, args: &Arguments) -> Result<Value> {
        let metadata = self.metadata(operation)?;

        let Some(resilience) = &self.inner.resilience else {
            return self.execute_with_retry(&metadata, args).await;
        };

        if !resilience.breaker.is_allowed() {
            let err = HttpClientError::CircuitOpen {
                endpoint: self.interface().to_string(),
            };
            return self.fall_back(resilience, operation, args, err);
        }

        match self.execute_with_retry(&metadata, args).await {
            Ok(value) => {
                resilience.breaker.record_success();
                Ok(value)
            }
            Err(e) => {
                resilience.breaker.record_failure();
                self.fall_back(resilience, operation, args, e)
            }
        }
    }

    fn metadata(&self, operation: &str) -> Result<MethodMetadata> {
        if let Some(metadata) = self.inner.methods.get(operation) {
            return Ok(metadata.clone());
        }

        let descriptor = &self.inner.descriptor;
        let op = descriptor
            .find_operation(operation)
            .ok_or_else(|| HttpClientError::UnknownOperation(format!("{}::{}", descriptor.id(), operation)))?;

        self.inner
            .contract
            .parse(descriptor, op)
            .map_err(|e| HttpClientError::RequestBuild(e.to_string()))
    }

    fn fall_back(
        &self,
        resilience: &Resilience,
        operation: &str,
        args: &Arguments,
        cause: HttpClientError,
    ) -> Result<Value> {
        match &resilience.fallback {
            Some(component) => {
                debug!(
                    endpoint = %self.interface(),
                    operation,
                    cause = %cause,
                    "Invoking fallback"
                );
                component.resolve(&cause).invoke(operation, args)
            }
            None => Err(cause),
        }
    }

    async fn execute_with_retry(&self, metadata: &MethodMetadata, args: &Arguments) -> Result<Value> {
        let inner = &self.inner;
        let mut attempt = 1;

        loop {
            let started = Instant::now();

            match self.execute_once(metadata, args).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    inner
                        .logger
                        .log_error(self.interface(), inner.log_level, &e, started.elapsed());

                    if !inner.retry.should_retry(attempt, &e) {
                        if attempt > 1 && e.is_retryable() {
                            return Err(HttpClientError::RetryExhausted {
                                attempts: attempt,
                                last: Box::new(e),
                            });
                        }
                        return Err(e);
                    }

                    let delay = inner.retry.retry_delay(attempt, &e);
                    inner
                        .logger
                        .log_retry(self.interface(), inner.log_level, attempt, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn execute_once(&self, metadata: &MethodMetadata, args: &Arguments) -> Result<Value> {
        let inner = &self.inner;

        let (mut template, body) = metadata.expand(args)?;
        if let Some(body) = body {
            inner.encoder.encode(&body, &mut template)?;
        }

        for interceptor in &inner.interceptors {
            interceptor.apply(&mut template);
        }

        let request = inner.target.apply(&template)?;
        inner.logger.log_request(self.interface(), inner.log_level, &request);

        let started = Instant::now();
        let response = inner.transport.execute(request, &inner.options).await?;
        inner
            .logger
            .log_response(self.interface(), inner.log_level, &response, started.elapsed());

        if response.is_success() {
            inner.decoder.decode(&response)
        } else {
            Err(inner.error_decoder.decode(metadata.name(), &response))
        }
    }
}

impl std::fmt::Debug for ClientProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientProxy")
            .field("interface", self.interface())
            .field("target", &self.inner.target)
            .field("wrapped", &self.is_wrapped())
            .field("profile", &self.inner.profile)
            .finish()
    }
}
