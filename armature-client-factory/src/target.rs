//! Target resolution.
//!
//! A target is the network address a client sends to, together with the
//! client interface it serves. Endpoints either use the literal `"url"`
//! target built from `base_url`, or name a custom target type.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::{EndpointConfig, TypeRef};
use crate::descriptor::InterfaceId;
use crate::error::{ComponentKind, ConfigurationError, FactoryError, FactoryResult};
use crate::instantiate::Instantiator;
use crate::transport::HttpRequest;
use crate::{RequestTemplate, Result};

/// Address a client sends its requests to.
pub trait Target: Send + Sync {
    /// Client interface this target was written for.
    fn interface(&self) -> &InterfaceId;

    /// Base URL requests are bound to.
    fn url(&self) -> &str;

    /// Check whether this target can serve `interface`.
    fn serves(&self, interface: &InterfaceId) -> bool {
        self.interface() == interface
    }

    /// Bind a request template to this target.
    fn apply(&self, template: &RequestTemplate) -> Result<HttpRequest> {
        template.to_request(self.url())
    }
}

/// Target built from a literal base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTarget {
    interface: InterfaceId,
    url: String,
}

impl UrlTarget {
    pub fn new(interface: impl Into<InterfaceId>, url: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            url: url.into(),
        }
    }
}

impl Target for UrlTarget {
    fn interface(&self) -> &InterfaceId {
        &self.interface
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Target validated against the client interface being built.
#[derive(Clone)]
pub struct ResolvedTarget {
    interface: InterfaceId,
    target: Arc<dyn Target>,
    custom: Option<TypeRef>,
}

impl ResolvedTarget {
    /// Resolve the target of `endpoint` for `interface`.
    pub fn resolve(
        interface: &InterfaceId,
        endpoint: &EndpointConfig,
        instantiator: &dyn Instantiator,
    ) -> FactoryResult<Self> {
        if endpoint.target.is_literal_url() {
            return Self::literal(interface, endpoint.base_url.as_deref());
        }

        let type_ref = &endpoint.target;
        let target = instantiator
            .target(type_ref)
            .map_err(|e| FactoryError::instantiation(ComponentKind::Target, type_ref, e))?;

        if !target.serves(interface) {
            return Err(ConfigurationError::BadTargetClass {
                target: type_ref.clone(),
                interface: interface.clone(),
            }
            .into());
        }

        debug!(interface = %interface, target = %type_ref, url = target.url(), "Resolved custom target");

        Ok(Self {
            interface: interface.clone(),
            target,
            custom: Some(type_ref.clone()),
        })
    }

    fn literal(interface: &InterfaceId, base_url: Option<&str>) -> FactoryResult<Self> {
        let missing = |reason: String| {
            FactoryError::from(ConfigurationError::MissingBaseUrl {
                interface: interface.clone(),
                reason,
            })
        };

        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| missing("baseUrl is not set".to_string()))?;

        url::Url::parse(base_url).map_err(|e| missing(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            interface: interface.clone(),
            target: Arc::new(UrlTarget::new(interface, base_url)),
            custom: None,
        })
    }

    /// Client interface served.
    pub fn interface(&self) -> &InterfaceId {
        &self.interface
    }

    /// Base URL.
    pub fn url(&self) -> &str {
        self.target.url()
    }

    /// Custom target type, `None` for the literal URL target.
    pub fn custom_type(&self) -> Option<&TypeRef> {
        self.custom.as_ref()
    }

    /// Bind a request template to this target.
    pub fn apply(&self, template: &RequestTemplate) -> Result<HttpRequest> {
        self.target.apply(template)
    }
}

impl PartialEq for ResolvedTarget {
    fn eq(&self, other: &Self) -> bool {
        self.interface == other.interface && self.url() == other.url() && self.custom == other.custom
    }
}

impl fmt::Debug for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedTarget")
            .field("interface", &self.interface)
            .field("url", &self.url())
            .field("custom", &self.custom)
            .finish()
    }
}
