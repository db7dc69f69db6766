//! Cache configuration
//!
//! Describes one platform service: where its objects live, which interfaces
//! matter, and how raw interface names map to frontend capability types.
//! The defaults describe a UDisks2-style storage service.
//!
//! ```rust
//! use property_cache::CacheConfig;
//!
//! let config = CacheConfig::from_json_str(r#"{ "identifier_prefix": "/test" }"#).unwrap();
//! assert_eq!(config.identifier_prefix, "/test");
//! assert_eq!(config.size_property, "Size");
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use device_backend::{BackendDescriptor, InterfaceType};

use crate::error::ConfigError;
use crate::media::RemovableMediaRule;

/// Presentation of the synthetic root device at the identifier prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootDeviceInfo {
    pub product: String,
    pub description: String,
    pub icon: String,
}

impl Default for RootDeviceInfo {
    fn default() -> Self {
        Self {
            product: "Storage".to_string(),
            description: "Storage devices".to_string(),
            icon: "server-database".to_string(),
        }
    }
}

/// Everything the cache needs to know about one platform service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Routing prefix for identifiers owned by this service
    pub identifier_prefix: String,

    /// Only objects under these prefixes are loaded on resync
    pub tracked_roots: Vec<String>,

    /// Objects under these prefixes are ignored entirely (e.g. jobs)
    pub ignored_prefixes: Vec<String>,

    /// When set, only interfaces whose name starts with this are merged
    pub interface_namespace: Option<String>,

    /// Interface every tracked device has; never re-fetched on add
    pub baseline_interface: String,

    /// Interface whose arrival signals a device is logically ready
    pub readiness_interface: String,

    /// Size property on the baseline interface, drives media detection
    pub size_property: String,

    /// Baseline property holding the parent object path
    pub parent_property: Option<String>,

    /// Property listing mount points on `StorageAccess` interfaces; the mount
    /// path and accessibility are derived from it when not reported directly
    pub mount_points_property: Option<String>,

    /// Raw interface name -> capability type
    pub interfaces: BTreeMap<String, InterfaceType>,

    pub removable_media: RemovableMediaRule,

    pub root: RootDeviceInfo,
}

impl Default for CacheConfig {
    fn default() -> Self {
        const SERVICE: &str = "org.freedesktop.UDisks2";
        const PATH: &str = "/org/freedesktop/UDisks2";

        let interfaces = [
            ("Block", InterfaceType::Block),
            ("Filesystem", InterfaceType::StorageAccess),
            ("Drive", InterfaceType::StorageDrive),
            ("Partition", InterfaceType::StorageVolume),
            ("OpticalDisc", InterfaceType::OpticalDisc),
            ("OpticalDrive", InterfaceType::OpticalDrive),
        ]
        .into_iter()
        .map(|(name, ty)| (format!("{}.{}", SERVICE, name), ty))
        .collect();

        Self {
            identifier_prefix: PATH.to_string(),
            tracked_roots: vec![format!("{}/block_devices", PATH), format!("{}/drives", PATH)],
            ignored_prefixes: vec![format!("{}/jobs", PATH)],
            interface_namespace: Some(SERVICE.to_string()),
            baseline_interface: format!("{}.Block", SERVICE),
            readiness_interface: format!("{}.Filesystem", SERVICE),
            size_property: "Size".to_string(),
            parent_property: Some("Drive".to_string()),
            mount_points_property: Some("MountPoints".to_string()),
            interfaces,
            removable_media: RemovableMediaRule::default(),
            root: RootDeviceInfo::default(),
        }
    }
}

impl CacheConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject configurations the cache cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier_prefix.is_empty() {
            return Err(ConfigError::Invalid("identifier_prefix must not be empty".to_string()));
        }
        if self.baseline_interface.is_empty() {
            return Err(ConfigError::Invalid("baseline_interface must not be empty".to_string()));
        }
        Ok(())
    }

    /// Capability types this service can report
    pub fn supported_interfaces(&self) -> BTreeSet<InterfaceType> {
        let mut types: BTreeSet<InterfaceType> = self.interfaces.values().copied().collect();
        types.insert(InterfaceType::GenericInterface);
        types
    }

    pub fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::new(self.identifier_prefix.clone(), self.supported_interfaces())
    }

    /// Capability type for a raw interface name
    pub fn interface_type(&self, interface: &str) -> Option<InterfaceType> {
        self.interfaces.get(interface).copied()
    }

    /// Raw interface names mapped to a capability type
    pub fn raw_interfaces(&self, ty: InterfaceType) -> impl Iterator<Item = &str> {
        self.interfaces
            .iter()
            .filter(move |(_, t)| **t == ty)
            .map(|(name, _)| name.as_str())
    }

    pub fn is_ignored(&self, udi: &str) -> bool {
        self.ignored_prefixes.iter().any(|p| udi.starts_with(p.as_str()))
    }

    pub fn is_tracked_root(&self, udi: &str) -> bool {
        self.tracked_roots.is_empty() || self.tracked_roots.iter().any(|p| udi.starts_with(p.as_str()))
    }

    pub fn in_namespace(&self, interface: &str) -> bool {
        self.interface_namespace
            .as_deref()
            .map_or(true, |ns| interface.starts_with(ns))
    }
}
