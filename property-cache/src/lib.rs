//! Per-backend interface/property cache
//!
//! Mirrors the state of one platform service (a D-Bus object manager or
//! anything shaped like one) and folds its raw notifications into
//! registry-level `DeviceEvent`s.
//!
//! # Features
//!
//! - **Incremental reconciliation**: interfaces added/removed and property
//!   changes update the cache and report what a consumer should see
//! - **Lazy fetch**: invalidated or unknown properties are fetched on first
//!   read; failures are remembered so they are not retried
//! - **Media detection**: size changes on removable drives become add/remove
//! - **Backend adapter**: `CachedBackend` serves `DeviceObject`s from the cache
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use device_backend::{Backend, DeviceEvent, PropertyMap};
//! use property_cache::{CacheConfig, CachedBackend, MemorySource};
//!
//! let source = Arc::new(MemorySource::new());
//! let backend = CachedBackend::new(Arc::clone(&source), CacheConfig::default());
//!
//! let udi = "/org/freedesktop/UDisks2/block_devices/sda1";
//! let mut interfaces = BTreeMap::new();
//! interfaces.insert("org.freedesktop.UDisks2.Block".to_string(), PropertyMap::new());
//!
//! backend.handle(source.add_interfaces(udi, interfaces));
//! assert_eq!(backend.take_events(), vec![DeviceEvent::added(udi)]);
//! assert!(backend.create_device(udi).is_some());
//! ```
//!
//! # Architecture
//!
//! ```text
//! ObjectSource ──RawEvent──► CachedBackend::handle()
//!                                 │
//!                                 ├── PropertyCache<S> ──► Vec<DeviceEvent>
//!                                 │                            │
//!                                 │                            ▼
//!                                 └── objects            mpsc channel ──► take_events()
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod media;
pub mod snapshot;
pub mod source;

pub use backend::{CachedBackend, CachedDevice, RootDevice};
pub use cache::PropertyCache;
pub use config::{CacheConfig, RootDeviceInfo};
pub use error::{ConfigError, Result, SourceError, SourceResult};
pub use event::RawEvent;
pub use media::{MediaDetector, RemovableMediaRule};
pub use snapshot::{CachedValue, Snapshot};
pub use source::{MemorySource, ObjectSource, SourceCall};
