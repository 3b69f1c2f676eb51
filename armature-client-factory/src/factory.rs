//! Client factory.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::builder::{ClientBuilder, ClientProfile, SelectedBuilder};
use crate::client::ClientProxy;
use crate::config::{EndpointConfig, GlobalConfig, TypeRef};
use crate::contract::MethodMetadata;
use crate::descriptor::{ClientInterfaceDescriptor, Discovery, InterfaceId};
use crate::error::{BoxError, ComponentKind, ConfigurationError, FactoryError, FactoryResult};
use crate::fallback::FallbackComponent;
use crate::instantiate::Instantiator;
use crate::registry::EndpointRegistry;
use crate::resilience::{ResiliencePresence, ResilienceSelector};
use crate::retry::RetryPolicyDecision;
use crate::target::ResolvedTarget;
use crate::transport::{ReqwestTransport, RequestOptions, Transport};

/// Builds one [`ClientProxy`] per client interface from its endpoint
/// configuration.
///
/// ```no_run
/// use armature_client_factory::prelude::*;
///
/// let users = ClientInterfaceDescriptor::new("users")
///     .operation(OperationDescriptor::new("get_user", "GET /users/{id}"));
/// let discovery = StaticDiscovery::new().register(users);
/// let config = GlobalConfig::new()
///     .with_endpoint("users", EndpointConfig::with_base_url("https://api.example.com"));
///
/// let factory = ClientFactory::new(config, &discovery, ComponentRegistry::new());
/// let client = factory.build(&InterfaceId::from("users")).unwrap();
/// ```
pub struct ClientFactory {
    registry: EndpointRegistry,
    interfaces: HashMap<InterfaceId, Arc<ClientInterfaceDescriptor>>,
    interceptor_types: HashSet<TypeRef>,
    instantiator: Arc<dyn Instantiator>,
    selector: ResilienceSelector,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientFactory {
    /// Create a factory. Discovery is read once, here.
    pub fn new(
        config: GlobalConfig,
        discovery: &dyn Discovery,
        instantiator: impl Instantiator + 'static,
    ) -> Self {
        let mut interfaces = HashMap::new();
        for descriptor in discovery.client_interfaces() {
            if !descriptor.is_client_interface() {
                debug!(interface = %descriptor.id(), "Ignoring interface without request operations");
                continue;
            }
            interfaces.insert(descriptor.id().clone(), Arc::new(descriptor));
        }

        Self {
            registry: EndpointRegistry::new(config),
            interfaces,
            interceptor_types: discovery.interceptors().into_iter().collect(),
            instantiator: Arc::new(instantiator),
            selector: ResilienceSelector::default(),
            transport: None,
        }
    }

    /// Replace the resilience runtime presence probe.
    pub fn with_presence(mut self, presence: impl ResiliencePresence + 'static) -> Self {
        self.selector = ResilienceSelector::new(Arc::new(presence));
        self
    }

    /// Share one transport between all clients instead of creating one per
    /// endpoint.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Discovered client interfaces, sorted.
    pub fn interfaces(&self) -> Vec<&InterfaceId> {
        let mut ids: Vec<_> = self.interfaces.keys().collect();
        ids.sort();
        ids
    }

    /// Build the client of `interface`.
    pub fn build(&self, interface: &InterfaceId) -> FactoryResult<ClientProxy> {
        let config = self.registry.get(interface)?;
        let descriptor = self.interfaces.get(interface).cloned().ok_or_else(|| {
            ConfigurationError::MissingEndpoint {
                interface: interface.clone(),
            }
        })?;

        let target = ResolvedTarget::resolve(interface, config, self.instantiator.as_ref())?;

        let retry = RetryPolicyDecision::resolve(config, self.registry.global())?;
        let retry_strategy = retry.strategy(self.instantiator.as_ref())?;

        let builder = self.selector.select(Arc::clone(&descriptor), config)?;
        let wrapped = builder.is_wrapped();

        let builder = self
            .attach_components(builder, &descriptor, config)?
            .retry_strategy(retry_strategy);

        let options = RequestOptions {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            follow_redirects: config.follow_redirects,
        };
        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(
                ReqwestTransport::new(&options).map_err(|e| FactoryError::Transport(e.to_string()))?,
            ),
        };

        let builder = builder
            .options(options)
            .transport(transport)
            .profile(ClientProfile {
                encoder: config.encoder.clone(),
                decoder: config.decoder.clone(),
                logger: config.logger.clone(),
                log_level: config.log_level,
                contract: config.contract.clone(),
                error_decoder: config.error_decoder.clone(),
                interceptors: config.interceptors.clone(),
                retry,
                fallback: config.fallback.clone(),
            });

        let client = match (builder, &config.fallback) {
            (SelectedBuilder::Wrapped(builder), Some(fallback)) => {
                match self.create(ComponentKind::Fallback, fallback, |i, t| i.fallback(t))? {
                    FallbackComponent::Static(f) => builder.target_with_fallback(target, f),
                    FallbackComponent::Factory(f) => builder.target_with_fallback_factory(target, f),
                }
            }
            (builder, _) => builder.target(target),
        };

        info!(
            endpoint = %interface,
            url = client.target().url(),
            wrapped,
            fallback = client.has_fallback(),
            "Built HTTP client"
        );

        Ok(client)
    }

    /// Build every discovered interface. A failing endpoint does not stop
    /// the others.
    pub fn build_all(&self) -> BuildReport {
        let results: BTreeMap<_, _> = self
            .interfaces()
            .into_iter()
            .map(|id| {
                let result = self.build(id);
                if let Err(e) = &result {
                    warn!(endpoint = %id, error = %e, "Failed to build HTTP client");
                }
                (id.clone(), result)
            })
            .collect();

        BuildReport { results }
    }

    fn attach_components(
        &self,
        builder: SelectedBuilder,
        descriptor: &ClientInterfaceDescriptor,
        config: &EndpointConfig,
    ) -> FactoryResult<SelectedBuilder> {
        let encoder = self.create(ComponentKind::Encoder, &config.encoder, |i, t| i.encoder(t))?;
        let decoder = self.create(ComponentKind::Decoder, &config.decoder, |i, t| i.decoder(t))?;
        let logger = self.create(ComponentKind::Logger, &config.logger, |i, t| i.logger(t))?;

        let contract_type = config
            .contract
            .clone()
            .unwrap_or_else(|| TypeRef::new(TypeRef::DEFAULT));
        let contract = self.create(ComponentKind::Contract, &contract_type, |i, t| i.contract(t))?;
        let methods = descriptor
            .operations()
            .iter()
            .map(|op| contract.parse(descriptor, op))
            .collect::<Result<Vec<MethodMetadata>, BoxError>>()
            .map_err(|e| FactoryError::instantiation(ComponentKind::Contract, &contract_type, e))?;

        let error_decoder_type = config
            .error_decoder
            .clone()
            .unwrap_or_else(|| TypeRef::new(TypeRef::DEFAULT));
        let error_decoder =
            self.create(ComponentKind::ErrorDecoder, &error_decoder_type, |i, t| i.error_decoder(t))?;

        let mut builder = builder
            .encoder(encoder)
            .decoder(decoder)
            .logger(logger, config.log_level)
            .contract(contract, methods)
            .error_decoder(error_decoder);

        for type_ref in &config.interceptors {
            if !self.interceptor_types.contains(type_ref) {
                return Err(FactoryError::instantiation(
                    ComponentKind::Interceptor,
                    type_ref,
                    "not a discovered interceptor type".into(),
                ));
            }
            let interceptor = self.create(ComponentKind::Interceptor, type_ref, |i, t| i.interceptor(t))?;
            builder = builder.interceptor(interceptor);
        }

        Ok(builder)
    }

    fn create<T>(
        &self,
        kind: ComponentKind,
        type_ref: &TypeRef,
        f: impl FnOnce(&dyn Instantiator, &TypeRef) -> Result<T, BoxError>,
    ) -> FactoryResult<T> {
        f(self.instantiator.as_ref(), type_ref).map_err(|e| FactoryError::instantiation(kind, type_ref, e))
    }
}

/// Outcome of [`ClientFactory::build_all`], per interface.
#[derive(Debug)]
pub struct BuildReport {
    results: BTreeMap<InterfaceId, FactoryResult<ClientProxy>>,
}

impl BuildReport {
    /// Result for `interface`, if it was discovered.
    pub fn get(&self, interface: &InterfaceId) -> Option<&FactoryResult<ClientProxy>> {
        self.results.get(interface)
    }

    /// Client for `interface`, if it was built.
    pub fn client(&self, interface: &InterfaceId) -> Option<&ClientProxy> {
        self.results.get(interface).and_then(|r| r.as_ref().ok())
    }

    /// Successfully built clients.
    pub fn clients(&self) -> impl Iterator<Item = (&InterfaceId, &ClientProxy)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().ok().map(|c| (id, c)))
    }

    /// Failed builds.
    pub fn failures(&self) -> impl Iterator<Item = (&InterfaceId, &FactoryError)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }

    /// Check if every interface was built.
    pub fn is_success(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> BTreeMap<InterfaceId, FactoryResult<ClientProxy>> {
        self.results
    }
}
