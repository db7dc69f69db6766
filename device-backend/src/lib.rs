//! # devhub backend contract
//!
//! Types shared between platform service adapters and the device registry.
//!
//! # Architecture
//!
//! ```text
//! platform service ──► Backend ──► DeviceEvent ──► registry
//!                        │
//!                        └── create_device() ──► DeviceObject
//!                                                  ├── interfaces()
//!                                                  └── property(type, name, mode)
//! ```
//!
//! # Example
//!
//! ```rust
//! use device_backend::{BackendDescriptor, InterfaceType};
//!
//! let descriptor = BackendDescriptor::new(
//!     "/org/freedesktop/UDisks2",
//!     [InterfaceType::Block, InterfaceType::StorageVolume],
//! );
//! assert!(descriptor.owns("/org/freedesktop/UDisks2/block_devices/sda1"));
//! ```

pub mod backend;
pub mod device;
pub mod error;
pub mod event;
pub mod interface;
pub mod value;

pub use backend::{Backend, BackendDescriptor};
pub use device::{DeviceObject, FetchMode, OpticalDisc, StorageAccess};
pub use error::{BackendError, Result};
pub use event::{ChangeKind, DeviceEvent, PropertyChanges};
pub use interface::InterfaceType;
pub use value::{InterfaceMap, PropertyMap, PropertyValue};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::backend::{Backend, BackendDescriptor};
    pub use crate::device::{DeviceObject, FetchMode};
    pub use crate::event::{ChangeKind, DeviceEvent};
    pub use crate::interface::InterfaceType;
    pub use crate::value::{InterfaceMap, PropertyMap, PropertyValue};
}
