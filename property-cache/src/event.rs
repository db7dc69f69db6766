//! Raw notifications from a platform service
//!
//! These mirror the object-manager style signals most device services emit.
//! They are consumed by `PropertyCache` and turned into `DeviceEvent`s.

use device_backend::{InterfaceMap, PropertyMap};

/// A raw, unreconciled notification
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Interfaces (with their current properties) appeared on an object
    InterfacesAdded { udi: String, interfaces: InterfaceMap },

    /// Interfaces disappeared from an object
    InterfacesRemoved { udi: String, interfaces: Vec<String> },

    /// Properties of one interface changed or were invalidated
    PropertiesChanged {
        udi: String,
        interface: String,
        changed: PropertyMap,
        invalidated: Vec<String>,
    },
}

impl RawEvent {
    /// The object path this event refers to
    pub fn udi(&self) -> &str {
        match self {
            RawEvent::InterfacesAdded { udi, .. }
            | RawEvent::InterfacesRemoved { udi, .. }
            | RawEvent::PropertiesChanged { udi, .. } => udi,
        }
    }

    /// Shorthand for a change-only `PropertiesChanged`
    pub fn changed(udi: impl Into<String>, interface: impl Into<String>, changed: PropertyMap) -> Self {
        RawEvent::PropertiesChanged {
            udi: udi.into(),
            interface: interface.into(),
            changed,
            invalidated: Vec::new(),
        }
    }

    /// Shorthand for an invalidation-only `PropertiesChanged`
    pub fn invalidated(
        udi: impl Into<String>,
        interface: impl Into<String>,
        invalidated: Vec<String>,
    ) -> Self {
        RawEvent::PropertiesChanged {
            udi: udi.into(),
            interface: interface.into(),
            changed: PropertyMap::new(),
            invalidated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_backend::PropertyValue;

    #[test]
    fn test_shorthands() {
        let mut changed = PropertyMap::new();
        changed.insert("Size".to_string(), PropertyValue::UInt(0));

        let event = RawEvent::changed("/dev/sr0", "Block", changed.clone());
        assert_eq!(event.udi(), "/dev/sr0");
        assert_eq!(
            event,
            RawEvent::PropertiesChanged {
                udi: "/dev/sr0".to_string(),
                interface: "Block".to_string(),
                changed,
                invalidated: vec![],
            }
        );

        let event = RawEvent::invalidated("/dev/sr0", "Block", vec!["IdLabel".to_string()]);
        assert!(matches!(event, RawEvent::PropertiesChanged { ref invalidated, .. } if invalidated.len() == 1));
    }
}
