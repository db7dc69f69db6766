//! The backend adapter contract
//!
//! Every platform service the registry can draw devices from is wrapped in a
//! `Backend`. The registry never looks past this trait: discovery, wire
//! encodings and action plumbing all stay on the backend side.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::device::DeviceObject;
use crate::event::DeviceEvent;
use crate::interface::InterfaceType;

/// Static facts about a backend: what it can produce and which ids it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Routing prefix; an identifier belongs to the first backend whose prefix it starts with
    pub identifier_prefix: String,
    /// Every interface type this backend can ever report
    pub supported_interfaces: BTreeSet<InterfaceType>,
}

impl BackendDescriptor {
    pub fn new(
        identifier_prefix: impl Into<String>,
        supported_interfaces: impl IntoIterator<Item = InterfaceType>,
    ) -> Self {
        Self {
            identifier_prefix: identifier_prefix.into(),
            supported_interfaces: supported_interfaces.into_iter().collect(),
        }
    }

    /// Whether this backend is responsible for `udi`
    pub fn owns(&self, udi: &str) -> bool {
        udi.starts_with(&self.identifier_prefix)
    }
}

/// Contract every platform service adapter implements
///
/// Implementations are driven from a single control flow per registry and
/// must not call back into the registry.
pub trait Backend: Send + Sync {
    fn descriptor(&self) -> &BackendDescriptor;

    /// Every known device identifier, fully re-synced from the service
    fn all_devices(&self) -> Vec<String>;

    /// Resolve a capability-bound object, `None` if the identifier is unknown
    ///
    /// The backend keeps ownership of the returned object; callers are
    /// expected to hold only weak references to it.
    fn create_device(&self, udi: &str) -> Option<Arc<dyn DeviceObject>>;

    /// Identifiers matching a parent scope and/or capability type
    ///
    /// With a parent, only direct children of that parent are returned
    /// (restricted to `ty` when given). Without a parent but with a type,
    /// every device of that type. With neither, every device.
    fn devices_from_query(&self, parent: Option<&str>, ty: Option<InterfaceType>) -> Vec<String>;

    /// Drain the registry-level events produced since the last call
    fn take_events(&self) -> Vec<DeviceEvent> {
        Vec::new()
    }

    fn supported_interfaces(&self) -> &BTreeSet<InterfaceType> {
        &self.descriptor().supported_interfaces
    }

    fn identifier_prefix(&self) -> &str {
        &self.descriptor().identifier_prefix
    }

    fn owns(&self, udi: &str) -> bool {
        self.descriptor().owns(udi)
    }
}
