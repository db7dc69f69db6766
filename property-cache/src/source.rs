//! Platform service access
//!
//! `ObjectSource` is the seam to the actual service (a D-Bus object manager,
//! a registry walker, a mount table reader...). Calls are blocking; timeouts
//! and retries belong to the implementation.

use std::collections::{BTreeMap, HashSet};

use parking_lot::{Mutex, RwLock};

use device_backend::{InterfaceMap, PropertyMap, PropertyValue};

use crate::error::{SourceError, SourceResult};
use crate::event::RawEvent;

/// Blocking access to a platform service's managed objects
pub trait ObjectSource: Send + Sync {
    /// Every managed object with all of its interfaces and properties
    fn managed_objects(&self) -> SourceResult<BTreeMap<String, InterfaceMap>>;

    /// A single property of one interface
    fn get_property(&self, udi: &str, interface: &str, property: &str) -> SourceResult<PropertyValue>;

    /// All properties of one interface
    fn get_all(&self, udi: &str, interface: &str) -> SourceResult<PropertyMap>;
}

/// A recorded call against `MemorySource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    ManagedObjects,
    GetProperty {
        udi: String,
        interface: String,
        property: String,
    },
    GetAll {
        udi: String,
        interface: String,
    },
}

/// In-process object source
///
/// Holds objects in memory, records every call made against it and can be
/// told to fail `get_all` for chosen interfaces. The mutation helpers return
/// the `RawEvent` a real service would have emitted for the same change.
#[derive(Default)]
pub struct MemorySource {
    objects: RwLock<BTreeMap<String, InterfaceMap>>,
    hidden: RwLock<HashSet<(String, String, String)>>,
    failing_get_all: RwLock<HashSet<String>>,
    calls: Mutex<Vec<SourceCall>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object without producing an event (initial population)
    pub fn insert_object(&self, udi: impl Into<String>, interfaces: InterfaceMap) {
        self.objects.write().insert(udi.into(), interfaces);
    }

    /// Add or replace interfaces on an object
    pub fn add_interfaces(&self, udi: &str, interfaces: InterfaceMap) -> RawEvent {
        let mut objects = self.objects.write();
        let entry = objects.entry(udi.to_string()).or_default();
        for (name, props) in &interfaces {
            entry.insert(name.clone(), props.clone());
        }
        RawEvent::InterfacesAdded {
            udi: udi.to_string(),
            interfaces,
        }
    }

    /// Remove interfaces; the object disappears once it has none left
    pub fn remove_interfaces(&self, udi: &str, interfaces: &[&str]) -> RawEvent {
        let mut objects = self.objects.write();
        if let Some(entry) = objects.get_mut(udi) {
            for name in interfaces {
                entry.remove(*name);
            }
            if entry.is_empty() {
                objects.remove(udi);
            }
        }
        RawEvent::InterfacesRemoved {
            udi: udi.to_string(),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Change a property and report the new value in the event
    pub fn set_property(
        &self,
        udi: &str,
        interface: &str,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> RawEvent {
        let value = value.into();
        self.store(udi, interface, property, value.clone());
        let mut changed = PropertyMap::new();
        changed.insert(property.to_string(), value);
        RawEvent::changed(udi, interface, changed)
    }

    /// Change a property but only report it as invalidated
    pub fn invalidate_property(
        &self,
        udi: &str,
        interface: &str,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> RawEvent {
        self.store(udi, interface, property, value.into());
        RawEvent::invalidated(udi, interface, vec![property.to_string()])
    }

    /// Make a property invisible to `get_property` while keeping it in `get_all`
    pub fn hide_property(&self, udi: &str, interface: &str, property: &str) {
        self.hidden
            .write()
            .insert((udi.to_string(), interface.to_string(), property.to_string()));
    }

    /// Make every `get_all` for `interface` fail
    pub fn fail_get_all(&self, interface: &str) {
        self.failing_get_all.write().insert(interface.to_string());
    }

    /// Calls made so far, oldest first
    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Number of `get_property` calls made for one key
    pub fn property_fetches(&self, udi: &str, interface: &str, property: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| {
                matches!(call, SourceCall::GetProperty { udi: u, interface: i, property: p }
                    if u == udi && i == interface && p == property)
            })
            .count()
    }

    fn store(&self, udi: &str, interface: &str, property: &str, value: PropertyValue) {
        self.objects
            .write()
            .entry(udi.to_string())
            .or_default()
            .entry(interface.to_string())
            .or_default()
            .insert(property.to_string(), value);
    }

    fn record(&self, call: SourceCall) {
        self.calls.lock().push(call);
    }
}

impl ObjectSource for MemorySource {
    fn managed_objects(&self) -> SourceResult<BTreeMap<String, InterfaceMap>> {
        self.record(SourceCall::ManagedObjects);
        Ok(self.objects.read().clone())
    }

    fn get_property(&self, udi: &str, interface: &str, property: &str) -> SourceResult<PropertyValue> {
        self.record(SourceCall::GetProperty {
            udi: udi.to_string(),
            interface: interface.to_string(),
            property: property.to_string(),
        });

        let hidden = self.hidden.read().contains(&(
            udi.to_string(),
            interface.to_string(),
            property.to_string(),
        ));

        let objects = self.objects.read();
        let iface = objects
            .get(udi)
            .ok_or_else(|| SourceError::UnknownObject(udi.to_string()))?
            .get(interface)
            .ok_or_else(|| SourceError::UnknownInterface {
                udi: udi.to_string(),
                interface: interface.to_string(),
            })?;

        iface
            .get(property)
            .filter(|_| !hidden)
            .cloned()
            .ok_or_else(|| SourceError::UnknownProperty {
                udi: udi.to_string(),
                interface: interface.to_string(),
                property: property.to_string(),
            })
    }

    fn get_all(&self, udi: &str, interface: &str) -> SourceResult<PropertyMap> {
        self.record(SourceCall::GetAll {
            udi: udi.to_string(),
            interface: interface.to_string(),
        });

        if self.failing_get_all.read().contains(interface) {
            return Err(SourceError::Transport(format!("GetAll({}) failed", interface)));
        }

        self.objects
            .read()
            .get(udi)
            .ok_or_else(|| SourceError::UnknownObject(udi.to_string()))?
            .get(interface)
            .cloned()
            .ok_or_else(|| SourceError::UnknownInterface {
                udi: udi.to_string(),
                interface: interface.to_string(),
            })
    }
}
