//! Cached interface/property state for one device

use std::collections::BTreeMap;

use device_backend::{InterfaceMap, PropertyMap, PropertyValue};

/// A cached property slot
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// Concrete value known
    Resolved(PropertyValue),
    /// Known to exist but must be fetched before use
    Unresolved,
    /// Known not to exist (or fetching it failed); do not ask again
    Absent,
}

impl CachedValue {
    pub fn resolved(&self) -> Option<&PropertyValue> {
        match self {
            CachedValue::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_resolved(self) -> Option<PropertyValue> {
        match self {
            CachedValue::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, CachedValue::Unresolved)
    }
}

/// Interface name -> property name -> cached value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    interfaces: BTreeMap<String, BTreeMap<String, CachedValue>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot where every supplied value is resolved
    pub fn from_interfaces(interfaces: InterfaceMap) -> Self {
        let mut snapshot = Self::new();
        for (name, props) in interfaces {
            snapshot.replace_interface(name, props);
        }
        snapshot
    }

    /// Replace an interface's properties wholesale
    pub fn replace_interface(&mut self, interface: impl Into<String>, props: PropertyMap) {
        let props = props
            .into_iter()
            .map(|(k, v)| (k, CachedValue::Resolved(v)))
            .collect();
        self.interfaces.insert(interface.into(), props);
    }

    /// Remove an interface, returning whether it was present
    pub fn remove_interface(&mut self, interface: &str) -> bool {
        self.interfaces.remove(interface).is_some()
    }

    /// Store a single slot, creating the interface if needed
    pub fn set(&mut self, interface: &str, property: impl Into<String>, value: CachedValue) {
        self.interfaces
            .entry(interface.to_string())
            .or_default()
            .insert(property.into(), value);
    }

    /// Store into an existing interface only; returns whether it was stored
    pub fn set_existing(&mut self, interface: &str, property: &str, value: CachedValue) -> bool {
        match self.interfaces.get_mut(interface) {
            Some(props) => {
                props.insert(property.to_string(), value);
                true
            }
            None => false,
        }
    }

    pub fn value(&self, interface: &str, property: &str) -> Option<&CachedValue> {
        self.interfaces.get(interface)?.get(property)
    }

    /// First interface (in name order) that has a slot for `property`
    pub fn interface_with(&self, property: &str) -> Option<&str> {
        self.interfaces
            .iter()
            .find(|(_, props)| props.contains_key(property))
            .map(|(name, _)| name.as_str())
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.contains_key(interface)
    }

    pub fn interface_names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Resolved values only, as plain maps
    pub fn resolved(&self) -> InterfaceMap {
        self.interfaces
            .iter()
            .map(|(name, props)| {
                let props = props
                    .iter()
                    .filter_map(|(k, v)| v.resolved().map(|v| (k.clone(), v.clone())))
                    .collect();
                (name.clone(), props)
            })
            .collect()
    }
}
