//! # devhub device registry
//!
//! One view over every device a set of backends can see: identity-stable
//! handles, predicate queries and ordered change notification.
//!
//! # Features
//!
//! - **Identity-stable handles**: every handle for an identifier shares one
//!   slot, so they agree on validity across removal and re-insertion
//! - **Predicate queries**: `IS StorageAccess AND Block.Size > 0`
//! - **Change notification**: callbacks or a blocking iterator, delivered
//!   after handles have been updated
//! - **Explicit lifetime**: `RegistryContext` creates the registry lazily and
//!   tears it down deterministically
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use device_backend::{Backend, PropertyMap};
//! use device_registry::Registry;
//! use property_cache::{CacheConfig, CachedBackend, MemorySource};
//!
//! let source = Arc::new(MemorySource::new());
//! let backend = Arc::new(CachedBackend::new(Arc::clone(&source), CacheConfig::default()));
//! let registry = Registry::new(vec![backend.clone() as Arc<dyn Backend>]);
//!
//! let udi = "/org/freedesktop/UDisks2/block_devices/sda";
//! let device = registry.find(udi);
//! assert!(!device.is_valid());
//!
//! let mut interfaces = BTreeMap::new();
//! interfaces.insert("org.freedesktop.UDisks2.Block".to_string(), PropertyMap::new());
//! backend.handle(source.add_interfaces(udi, interfaces));
//! registry.process_events();
//!
//! assert!(device.is_valid());
//! ```
//!
//! # Iteration
//!
//! ```rust,ignore
//! let events = registry.notifier().subscribe_iter();
//! registry.process_events();
//! for event in events.try_iter() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod context;
pub mod error;
pub mod handle;
pub mod iter;
pub mod logging;
pub mod notifier;
pub mod registry;

pub use context::RegistryContext;
pub use error::{RegistryError, Result};
pub use handle::DeviceHandle;
pub use iter::NotifierIterator;
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use notifier::{ChangeNotifier, SubscriptionId};
pub use registry::Registry;

pub use device_backend::{DeviceEvent, InterfaceType, PropertyValue};
pub use device_predicate::Predicate;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::context::RegistryContext;
    pub use crate::handle::DeviceHandle;
    pub use crate::notifier::ChangeNotifier;
    pub use crate::registry::Registry;
    pub use device_backend::{DeviceEvent, InterfaceType, PropertyValue};
    pub use device_predicate::Predicate;
}
