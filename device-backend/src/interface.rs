//! Capability kinds a device can report

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Frontend capability kinds a device can expose
///
/// Each backend reports a fixed subset of these. The declaration order is
/// significant: it is the order the registry walks capability types when it
/// enumerates candidates for a query, which keeps result order stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InterfaceType {
    Unknown,
    GenericInterface,
    Processor,
    Block,
    StorageAccess,
    StorageDrive,
    OpticalDrive,
    StorageVolume,
    OpticalDisc,
    Camera,
    PortableMediaPlayer,
    Battery,
    NetworkShare,
}

impl InterfaceType {
    /// All known types, `Unknown` excluded
    pub const ALL: [InterfaceType; 12] = [
        InterfaceType::GenericInterface,
        InterfaceType::Processor,
        InterfaceType::Block,
        InterfaceType::StorageAccess,
        InterfaceType::StorageDrive,
        InterfaceType::OpticalDrive,
        InterfaceType::StorageVolume,
        InterfaceType::OpticalDisc,
        InterfaceType::Camera,
        InterfaceType::PortableMediaPlayer,
        InterfaceType::Battery,
        InterfaceType::NetworkShare,
    ];

    /// Get the name of this interface type as used in predicates
    pub fn name(&self) -> &'static str {
        match self {
            InterfaceType::Unknown => "Unknown",
            InterfaceType::GenericInterface => "GenericInterface",
            InterfaceType::Processor => "Processor",
            InterfaceType::Block => "Block",
            InterfaceType::StorageAccess => "StorageAccess",
            InterfaceType::StorageDrive => "StorageDrive",
            InterfaceType::OpticalDrive => "OpticalDrive",
            InterfaceType::StorageVolume => "StorageVolume",
            InterfaceType::OpticalDisc => "OpticalDisc",
            InterfaceType::Camera => "Camera",
            InterfaceType::PortableMediaPlayer => "PortableMediaPlayer",
            InterfaceType::Battery => "Battery",
            InterfaceType::NetworkShare => "NetworkShare",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterfaceType {
    type Err = BackendError;

    /// Case-insensitive lookup by name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("Unknown") {
            return Ok(InterfaceType::Unknown);
        }
        InterfaceType::ALL
            .iter()
            .copied()
            .find(|ty| ty.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BackendError::UnknownInterface(s.to_string()))
    }
}
