//! Device objects and typed capability views
//!
//! A backend hands out one `DeviceObject` per identifier. Instead of a type
//! per capability combination, a device reports the set of `InterfaceType`s
//! it implements and answers property lookups scoped by type. The typed views
//! (`StorageAccess`, `OpticalDisc`) are thin readers over those lookups and are
//! only constructible when the device reports the matching type.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::interface::InterfaceType;
use crate::value::PropertyValue;

/// How a property lookup may reach the platform service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FetchMode {
    /// Only answer from values already in the cache
    CachedOnly,
    /// Resolve unknown or invalidated values with a blocking call
    #[default]
    FetchIfNeeded,
}

/// A capability-bound device produced by a backend
pub trait DeviceObject: Send + Sync {
    /// Unique identifier of this device
    fn udi(&self) -> &str;

    /// Identifier of the parent device, `None` for roots
    fn parent_udi(&self) -> Option<String>;

    fn vendor(&self) -> String {
        String::new()
    }

    fn product(&self) -> String {
        String::new()
    }

    fn description(&self) -> String {
        String::new()
    }

    fn icon(&self) -> String {
        String::new()
    }

    /// Capability types this device currently implements
    fn interfaces(&self) -> BTreeSet<InterfaceType>;

    /// Check for a single capability type
    fn query_interface(&self, ty: InterfaceType) -> bool {
        self.interfaces().contains(&ty)
    }

    /// Read a property of the given capability type
    ///
    /// Returns `None` when the property does not exist, could not be
    /// fetched, or (in `CachedOnly` mode) has not been fetched yet.
    fn property(&self, ty: InterfaceType, name: &str, mode: FetchMode) -> Option<PropertyValue>;
}

impl fmt::Debug for dyn DeviceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceObject")
            .field("udi", &self.udi())
            .field("interfaces", &self.interfaces())
            .finish()
    }
}

// ============================================================================
// StorageAccess
// ============================================================================

/// Mountable storage: where it is mounted and whether it is usable
#[derive(Clone)]
pub struct StorageAccess {
    device: Arc<dyn DeviceObject>,
}

impl StorageAccess {
    pub const FILE_PATH: &'static str = "FilePath";
    pub const ACCESSIBLE: &'static str = "Accessible";
    pub const IGNORED: &'static str = "Ignored";

    /// Build the view if the device reports `StorageAccess`
    pub fn from_device(device: Arc<dyn DeviceObject>) -> Option<Self> {
        device
            .query_interface(InterfaceType::StorageAccess)
            .then_some(Self { device })
    }

    /// Mount point, empty if unknown
    pub fn file_path(&self) -> String {
        self.read(Self::FILE_PATH)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn is_accessible(&self) -> bool {
        self.read(Self::ACCESSIBLE)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Hidden from user interfaces (e.g. `x-gvfs-hide` mount option)
    pub fn is_ignored(&self) -> bool {
        self.read(Self::IGNORED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn read(&self, name: &str) -> Option<PropertyValue> {
        self.device
            .property(InterfaceType::StorageAccess, name, FetchMode::FetchIfNeeded)
    }
}

// ============================================================================
// OpticalDisc
// ============================================================================

/// Media inserted in an optical drive
#[derive(Clone)]
pub struct OpticalDisc {
    device: Arc<dyn DeviceObject>,
}

impl OpticalDisc {
    pub const DISC_TYPE: &'static str = "DiscType";
    pub const AVAILABLE_CONTENT: &'static str = "AvailableContent";
    pub const APPENDABLE: &'static str = "Appendable";
    pub const BLANK: &'static str = "Blank";
    pub const REWRITABLE: &'static str = "Rewritable";
    pub const CAPACITY: &'static str = "Capacity";

    /// Build the view if the device reports `OpticalDisc`
    pub fn from_device(device: Arc<dyn DeviceObject>) -> Option<Self> {
        device
            .query_interface(InterfaceType::OpticalDisc)
            .then_some(Self { device })
    }

    pub fn disc_type(&self) -> Option<String> {
        self.read(Self::DISC_TYPE)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Content kinds on the disc (audio, data, video...)
    pub fn available_content(&self) -> Vec<String> {
        match self.read(Self::AVAILABLE_CONTENT) {
            Some(PropertyValue::StrList(list)) => list,
            Some(PropertyValue::Str(single)) if !single.is_empty() => vec![single],
            _ => Vec::new(),
        }
    }

    pub fn is_appendable(&self) -> bool {
        self.flag(Self::APPENDABLE)
    }

    pub fn is_blank(&self) -> bool {
        self.flag(Self::BLANK)
    }

    pub fn is_rewritable(&self) -> bool {
        self.flag(Self::REWRITABLE)
    }

    /// Capacity in bytes, 0 if unknown
    pub fn capacity(&self) -> u64 {
        self.read(Self::CAPACITY)
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    fn flag(&self, name: &str) -> bool {
        self.read(name).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn read(&self, name: &str) -> Option<PropertyValue> {
        self.device
            .property(InterfaceType::OpticalDisc, name, FetchMode::FetchIfNeeded)
    }
}
