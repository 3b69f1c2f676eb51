//! Read-only lookup of endpoint configuration.

use crate::config::{EndpointConfig, GlobalConfig};
use crate::descriptor::InterfaceId;
use crate::error::{ConfigurationError, FactoryResult};

/// Endpoint configurations keyed by client interface.
///
/// Populated once from a [`GlobalConfig`] and never written afterwards, so
/// concurrent builds read it without locking.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    config: GlobalConfig,
}

impl EndpointRegistry {
    pub fn new(config: GlobalConfig) -> Self {
        Self { config }
    }

    /// Get the configuration of `interface`.
    pub fn get(&self, interface: &InterfaceId) -> FactoryResult<&EndpointConfig> {
        self.config.endpoints.get(interface).ok_or_else(|| {
            ConfigurationError::MissingEndpoint {
                interface: interface.clone(),
            }
            .into()
        })
    }

    /// Check whether `interface` is configured.
    pub fn contains(&self, interface: &InterfaceId) -> bool {
        self.config.endpoints.contains_key(interface)
    }

    /// Global block holding the fallback retry settings.
    pub fn global(&self) -> &GlobalConfig {
        &self.config
    }

    /// Configured interfaces, in no particular order.
    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceId> {
        self.config.endpoints.keys()
    }

    pub fn len(&self) -> usize {
        self.config.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.endpoints.is_empty()
    }
}

impl From<GlobalConfig> for EndpointRegistry {
    fn from(config: GlobalConfig) -> Self {
        Self::new(config)
    }
}
