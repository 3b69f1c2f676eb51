//! Client interface descriptors and the discovery seam.
//!
//! A client interface is a named set of request operations. Descriptors are
//! registered explicitly by the application (or by whatever discovery
//! mechanism it prefers) and handed to the factory through [`Discovery`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::TypeRef;

/// Identifier of a client interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(String);

impl InterfaceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterfaceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for InterfaceId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&InterfaceId> for InterfaceId {
    fn from(id: &InterfaceId) -> Self {
        id.clone()
    }
}

/// One declared request operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    name: String,
    request_line: String,
    headers: Vec<String>,
    body: Option<String>,
}

impl OperationDescriptor {
    /// Create an operation from its request line, e.g. `"GET /users/{id}"`.
    pub fn new(name: impl Into<String>, request_line: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_line: request_line.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header template, e.g. `"Authorization: Bearer {token}"`.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    /// Set a literal body template.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request_line(&self) -> &str {
        &self.request_line
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn body_template(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Declarative description of a remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInterfaceDescriptor {
    id: InterfaceId,
    headers: Vec<String>,
    operations: Vec<OperationDescriptor>,
}

impl ClientInterfaceDescriptor {
    pub fn new(id: impl Into<InterfaceId>) -> Self {
        Self {
            id: id.into(),
            headers: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Add a header template applied to every operation.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    /// Declare an operation.
    pub fn operation(mut self, operation: OperationDescriptor) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn id(&self) -> &InterfaceId {
        &self.id
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    /// Look up an operation by name.
    pub fn find_operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// A client interface declares at least one request operation.
    pub fn is_client_interface(&self) -> bool {
        !self.operations.is_empty()
    }
}

/// Source of client interfaces and interceptor types.
pub trait Discovery: Send + Sync {
    /// Candidate client interfaces.
    fn client_interfaces(&self) -> Vec<ClientInterfaceDescriptor>;

    /// Concrete interceptor types endpoints may reference.
    fn interceptors(&self) -> Vec<TypeRef>;
}

/// Discovery backed by explicit registration.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    interfaces: Vec<ClientInterfaceDescriptor>,
    interceptors: Vec<TypeRef>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client interface. Descriptors without operations are skipped.
    pub fn register(mut self, descriptor: ClientInterfaceDescriptor) -> Self {
        if descriptor.is_client_interface() {
            self.interfaces.push(descriptor);
        } else {
            debug!(interface = %descriptor.id(), "Skipping interface without request operations");
        }
        self
    }

    /// Register an interceptor type.
    pub fn interceptor(mut self, interceptor: impl Into<TypeRef>) -> Self {
        self.interceptors.push(interceptor.into());
        self
    }
}

impl Discovery for StaticDiscovery {
    fn client_interfaces(&self) -> Vec<ClientInterfaceDescriptor> {
        self.interfaces.clone()
    }

    fn interceptors(&self) -> Vec<TypeRef> {
        self.interceptors.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> ClientInterfaceDescriptor {
        ClientInterfaceDescriptor::new("users")
            .header("Accept: application/json")
            .operation(OperationDescriptor::new("get_user", "GET /users/{id}"))
    }

    #[test]
    fn test_find_operation() {
        let descriptor = users();
        assert!(descriptor.find_operation("get_user").is_some());
        assert!(descriptor.find_operation("delete_user").is_none());
    }

    #[test]
    fn test_static_discovery_skips_empty_interfaces() {
        let discovery = StaticDiscovery::new()
            .register(users())
            .register(ClientInterfaceDescriptor::new("marker"))
            .interceptor("auth");

        let ids: Vec<_> = discovery
            .client_interfaces()
            .into_iter()
            .map(|d| d.id().clone())
            .collect();
        assert_eq!(ids, vec![InterfaceId::from("users")]);
        assert_eq!(discovery.interceptors(), vec![TypeRef::from("auth")]);
    }
}
