//! Resilience wrapper selection.
//!
//! Decides per endpoint whether the client is wrapped with a circuit
//! breaker and fallback, from the endpoint's [`ResilienceMode`] and whether
//! the resilience runtime is present.

use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::builder::{PlainClientBuilder, SelectedBuilder, WrappedClientBuilder};
use crate::config::{EndpointConfig, ResilienceMode};
use crate::descriptor::{ClientInterfaceDescriptor, InterfaceId};
use crate::error::{FactoryResult, ResilienceError};

/// Reports whether the resilience runtime is available.
pub trait ResiliencePresence: Send + Sync {
    fn is_present(&self) -> bool;
}

/// Fixed answer, mostly for tests.
impl ResiliencePresence for bool {
    fn is_present(&self) -> bool {
        *self
    }
}

static RUNTIME_PRESENT: LazyLock<bool> = LazyLock::new(|| {
    let present = cfg!(feature = "circuit-breaker");
    debug!(present, "Probed resilience runtime");
    present
});

/// Presence derived from the `circuit-breaker` feature, probed once per
/// process.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureProbe;

impl ResiliencePresence for FeatureProbe {
    fn is_present(&self) -> bool {
        *RUNTIME_PRESENT
    }
}

/// Builder variant chosen for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    Plain,
    Wrapped,
}

/// Picks the builder variant for each endpoint.
#[derive(Clone)]
pub struct ResilienceSelector {
    presence: Arc<dyn ResiliencePresence>,
}

impl ResilienceSelector {
    pub fn new(presence: Arc<dyn ResiliencePresence>) -> Self {
        Self { presence }
    }

    /// Decide the wrapper for `endpoint`.
    ///
    /// A fallback needs a wrapped client; configuring one on an endpoint
    /// that ends up plain is an error.
    pub fn decide(
        &self,
        endpoint: &InterfaceId,
        mode: ResilienceMode,
        has_fallback: bool,
    ) -> Result<WrapperKind, ResilienceError> {
        let present = self.presence.is_present();

        let kind = match mode {
            ResilienceMode::Disabled => WrapperKind::Plain,
            ResilienceMode::Enabled if present => WrapperKind::Wrapped,
            ResilienceMode::Enabled => {
                return Err(ResilienceError::RuntimeNotPresent {
                    endpoint: endpoint.clone(),
                });
            }
            ResilienceMode::Auto if present => WrapperKind::Wrapped,
            ResilienceMode::Auto => {
                debug!(endpoint = %endpoint, "Resilience runtime absent, building plain client");
                WrapperKind::Plain
            }
        };

        if kind == WrapperKind::Plain && has_fallback {
            return Err(ResilienceError::RuntimeNotPresent {
                endpoint: endpoint.clone(),
            });
        }

        Ok(kind)
    }

    /// Create the builder for `descriptor` configured by `config`.
    pub fn select(
        &self,
        descriptor: Arc<ClientInterfaceDescriptor>,
        config: &EndpointConfig,
    ) -> FactoryResult<SelectedBuilder> {
        let kind = self.decide(descriptor.id(), config.resilience_mode, config.fallback.is_some())?;

        Ok(match kind {
            WrapperKind::Plain => SelectedBuilder::Plain(PlainClientBuilder::new(descriptor)),
            WrapperKind::Wrapped => SelectedBuilder::Wrapped(WrappedClientBuilder::new(
                descriptor,
                config.circuit_breaker.clone(),
            )),
        })
    }
}

impl Default for ResilienceSelector {
    fn default() -> Self {
        Self::new(Arc::new(FeatureProbe))
    }
}
