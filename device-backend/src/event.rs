//! Registry-level device events
//!
//! Backends translate raw platform notifications into these three shapes.
//! The registry re-emits them to subscribers unchanged.

use std::collections::BTreeMap;

/// How a single property changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Modified,
    Added,
    Removed,
}

/// Property name -> change kind, as carried by `DeviceEvent::PropertyChanged`
pub type PropertyChanges = BTreeMap<String, ChangeKind>;

/// A normalized add/remove/change notification for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A device appeared, or its composition changed and it must be re-evaluated
    Added(String),
    /// A device disappeared, or is about to be re-added with a new composition
    Removed(String),
    /// Properties of a tracked device changed
    PropertyChanged { udi: String, changes: PropertyChanges },
}

impl DeviceEvent {
    /// The identifier this event refers to
    pub fn udi(&self) -> &str {
        match self {
            DeviceEvent::Added(udi) | DeviceEvent::Removed(udi) => udi,
            DeviceEvent::PropertyChanged { udi, .. } => udi,
        }
    }

    pub fn added(udi: impl Into<String>) -> Self {
        DeviceEvent::Added(udi.into())
    }

    pub fn removed(udi: impl Into<String>) -> Self {
        DeviceEvent::Removed(udi.into())
    }
}
