//! Service advertisement.
//!
//! Describes what this node serves: its namespace, its address, the
//! service tags declared by tagged handlers and the registered handler
//! names. Serialized as JSON for service discovery.
//!
//! # Example
//!
//! ```
//! use gridd::advertise::ServiceInfo;
//! use gridd::handler::HandlerRegistry;
//! use gridd::transport::AddrInfo;
//!
//! let registry = HandlerRegistry::new();
//! let info = ServiceInfo::from_registry(&registry, &AddrInfo::Unknown);
//!
//! let json = info.to_json().unwrap();
//! assert!(json.contains("\"handlers\":[]"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handler::{HandlerRegistry, ServiceTag};
use crate::namespace::NamespaceStore;
use crate::transport::AddrInfo;

/// A registered handler as seen from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    /// Handler name.
    pub name: String,
    /// Whether the handler declared service tags.
    pub tagged: bool,
}

/// Advertisement of one service node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Namespace name, absent until the namespace is known.
    pub ns_name: Option<String>,
    /// Address the node listens on.
    pub addr: String,
    /// Tags aggregated from tagged handlers.
    pub tags: Vec<ServiceTag>,
    /// Registered handlers, newest first.
    pub handlers: Vec<HandlerDescriptor>,
}

impl ServiceInfo {
    /// Snapshot the registry's handlers and tags.
    pub fn from_registry(registry: &HandlerRegistry, addr: &AddrInfo) -> Self {
        let handlers = registry
            .entries()
            .map(|entry| HandlerDescriptor {
                name: entry.name().to_owned(),
                tagged: entry.is_tagged(),
            })
            .collect();

        Self {
            ns_name: None,
            addr: addr.to_string(),
            tags: registry.service_tags().map(<[_]>::to_vec).unwrap_or_default(),
            handlers,
        }
    }

    /// Fill in the current namespace name.
    pub fn with_namespace(mut self, store: &NamespaceStore) -> Self {
        self.ns_name = store.ns_name();
        self
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
