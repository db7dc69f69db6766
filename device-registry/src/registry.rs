//! The device registry
//!
//! Multiplexes every registered backend behind one identity map. Identifiers
//! are routed to the first backend whose prefix they start with; queries fan
//! out to every backend that can produce the requested capability types.
//!
//! Backend events do not reach subscribers directly: `process_events` drains
//! them, updates handle validity, then broadcasts them. The arena lock is
//! never held while a backend or a subscriber runs.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, MAIN_SEPARATOR};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use device_backend::{Backend, DeviceEvent, DeviceObject, InterfaceType};
use device_predicate::Predicate;

use crate::error::Result;
use crate::handle::{DeviceHandle, HandleArena};
use crate::notifier::ChangeNotifier;

/// State shared between a registry and every handle it hands out
pub(crate) struct Shared {
    backends: RwLock<Vec<Arc<dyn Backend>>>,
    pub(crate) arena: Mutex<HandleArena>,
    notifier: ChangeNotifier,
}

impl Shared {
    fn backends(&self) -> Vec<Arc<dyn Backend>> {
        self.backends.read().clone()
    }

    /// First backend whose prefix `udi` starts with
    fn route(&self, udi: &str) -> Option<Arc<dyn Backend>> {
        self.backends.read().iter().find(|b| b.owns(udi)).cloned()
    }

    fn create_backing(&self, udi: &str) -> Option<Weak<dyn DeviceObject>> {
        let backend = self.route(udi)?;
        let device = backend.create_device(udi)?;
        Some(Arc::downgrade(&device))
    }

    pub(crate) fn find(self: &Arc<Self>, udi: &str) -> DeviceHandle {
        if udi.is_empty() {
            return DeviceHandle::null();
        }

        if self.arena.lock().acquire(udi) {
            return DeviceHandle::from_acquired(udi, Arc::clone(self));
        }

        let backing = self.create_backing(udi);
        if backing.is_none() {
            debug!("No backend object for {}", udi);
        }
        self.arena.lock().acquire_or_insert(udi, backing);
        DeviceHandle::from_acquired(udi, Arc::clone(self))
    }

    fn on_backend_device_added(&self, udi: &str) {
        if !self.arena.lock().needs_backing(udi) {
            return;
        }
        // A handle asked for this device while it was missing.
        let backing = self.create_backing(udi);
        debug!("Revalidating {} (resolved: {})", udi, backing.is_some());
        self.arena.lock().set_backing(udi, backing);
    }

    fn on_backend_device_removed(&self, udi: &str) {
        self.arena.lock().invalidate(udi);
    }
}

/// Device registry over a fixed set of backends
///
/// Cheap to clone; clones share the identity map, the backends and the
/// notifier.
///
/// # Example
///
/// ```rust,ignore
/// let registry = Registry::new(vec![backend]);
///
/// for device in registry.query("IS StorageAccess", None) {
///     println!("{} {}", device.udi(), device.product());
/// }
///
/// registry.notifier().on_device_added(|udi| println!("added {}", udi));
/// registry.process_events();
/// ```
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Registry {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        info!("Creating device registry with {} backends", backends.len());
        Self {
            shared: Arc::new(Shared {
                backends: RwLock::new(backends),
                arena: Mutex::new(HandleArena::default()),
                notifier: ChangeNotifier::new(),
            }),
        }
    }

    pub fn backends(&self) -> Vec<Arc<dyn Backend>> {
        self.shared.backends()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.shared.notifier
    }

    /// Full resync of every backend; returns the number of devices known
    pub fn resync(&self) -> usize {
        self.shared
            .backends()
            .iter()
            .map(|backend| {
                let count = backend.all_devices().len();
                debug!("{}: {} devices", backend.identifier_prefix(), count);
                count
            })
            .sum()
    }

    /// Every device of every backend, in backend registration order
    pub fn all_devices(&self) -> Vec<DeviceHandle> {
        let mut handles = Vec::new();
        for backend in self.shared.backends() {
            for udi in backend.all_devices() {
                handles.push(self.shared.find(&udi));
            }
        }
        handles
    }

    /// Handle for `udi`; the null handle for the empty identifier
    ///
    /// Unknown identifiers still get a handle, it is just invalid until the
    /// device shows up.
    pub fn find(&self, udi: &str) -> DeviceHandle {
        self.shared.find(udi)
    }

    /// Devices matching a predicate string, optionally under `parent`
    ///
    /// An unparseable predicate yields no devices.
    pub fn query(&self, predicate: &str, parent: Option<&str>) -> Vec<DeviceHandle> {
        self.query_predicate(&Predicate::from_str_lossy(predicate), parent)
    }

    /// Like `query` but reports parse errors
    pub fn try_query(&self, predicate: &str, parent: Option<&str>) -> Result<Vec<DeviceHandle>> {
        let predicate = Predicate::parse(predicate)?;
        Ok(self.query_predicate(&predicate, parent))
    }

    pub fn query_predicate(&self, predicate: &Predicate, parent: Option<&str>) -> Vec<DeviceHandle> {
        if !predicate.is_valid() {
            return Vec::new();
        }
        // The empty predicate lists everything; the parent scope does not apply.
        if predicate.is_empty() {
            return self.all_devices();
        }

        let used = predicate.used_types();
        let mut handles = Vec::new();

        for backend in self.shared.backends() {
            let types: BTreeSet<InterfaceType> = backend
                .supported_interfaces()
                .intersection(&used)
                .copied()
                .collect();
            if types.is_empty() {
                continue;
            }

            let mut seen = BTreeSet::new();
            for ty in types {
                for udi in backend.devices_from_query(parent, Some(ty)) {
                    if !seen.insert(udi.clone()) {
                        continue;
                    }
                    let handle = self.shared.find(&udi);
                    let matched = handle
                        .backing()
                        .is_some_and(|device| predicate.matches(device.as_ref()));
                    if matched {
                        handles.push(handle);
                    }
                }
            }
        }

        handles
    }

    /// Devices reporting `ty`, optionally under `parent`
    pub fn list_from_type(&self, ty: InterfaceType, parent: Option<&str>) -> Vec<DeviceHandle> {
        let mut handles = Vec::new();
        for backend in self.shared.backends() {
            if !backend.supported_interfaces().contains(&ty) {
                continue;
            }
            for udi in backend.devices_from_query(parent, Some(ty)) {
                handles.push(self.shared.find(&udi));
            }
        }
        handles
    }

    /// The storage device whose mount point is the longest prefix of `path`
    ///
    /// Returns the null handle when the path does not exist or nothing
    /// mounted contains it.
    pub fn storage_access_from_path(&self, path: impl AsRef<Path>) -> DeviceHandle {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Incorrect file path: {}", path.display());
            return DeviceHandle::null();
        }

        let path = with_trailing_separator(&path.to_string_lossy());
        let mut best = DeviceHandle::null();
        let mut best_len = 0;

        for handle in self.list_from_type(InterfaceType::StorageAccess, None) {
            let Some(access) = handle.as_storage_access() else {
                continue;
            };
            let mount = access.file_path();
            if mount.is_empty() {
                continue;
            }
            let mount = with_trailing_separator(&mount);
            if path.starts_with(&mount) && mount.len() > best_len {
                best_len = mount.len();
                best = handle;
            }
        }

        best
    }

    /// Drain every backend's events, update handles, then broadcast
    ///
    /// Backends are drained in registration order; each backend's events are
    /// applied and delivered in the order it produced them. Returns the
    /// number of events delivered.
    pub fn process_events(&self) -> usize {
        let mut delivered = 0;
        for backend in self.shared.backends() {
            for event in backend.take_events() {
                match &event {
                    DeviceEvent::Added(udi) => self.shared.on_backend_device_added(udi),
                    DeviceEvent::Removed(udi) => self.shared.on_backend_device_removed(udi),
                    DeviceEvent::PropertyChanged { .. } => {}
                }
                self.shared.notifier.broadcast(&event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of identifiers in the identity map
    pub fn tracked_handles(&self) -> usize {
        self.shared.arena.lock().len()
    }

    /// Release backends and subscribers; outstanding handles become invalid
    pub fn teardown(&self) {
        let backends = std::mem::take(&mut *self.shared.backends.write());
        self.shared.arena.lock().invalidate_all();
        self.shared.notifier.clear();
        info!("Device registry torn down, released {} backends", backends.len());
    }
}

fn with_trailing_separator(path: &str) -> String {
    if path.ends_with(MAIN_SEPARATOR) {
        path.to_string()
    } else {
        format!("{}{}", path, MAIN_SEPARATOR)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefixes: Vec<String> = self
            .shared
            .backends()
            .iter()
            .map(|b| b.identifier_prefix().to_string())
            .collect();
        f.debug_struct("Registry")
            .field("backends", &prefixes)
            .field("handles", &self.tracked_handles())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_backend::{BackendDescriptor, FetchMode, PropertyValue};
    use std::collections::HashMap;

    /// Backend serving a fixed set of devices with no properties
    struct StaticBackend {
        descriptor: BackendDescriptor,
        objects: Mutex<HashMap<String, Arc<dyn DeviceObject>>>,
        events: Mutex<Vec<DeviceEvent>>,
    }

    struct Plain {
        udi: String,
        types: BTreeSet<InterfaceType>,
    }

    impl DeviceObject for Plain {
        fn udi(&self) -> &str {
            &self.udi
        }

        fn parent_udi(&self) -> Option<String> {
            None
        }

        fn interfaces(&self) -> BTreeSet<InterfaceType> {
            self.types.clone()
        }

        fn property(&self, _: InterfaceType, _: &str, _: FetchMode) -> Option<PropertyValue> {
            None
        }
    }

    impl StaticBackend {
        fn new(prefix: &str, devices: &[(&str, InterfaceType)]) -> Arc<Self> {
            let objects = devices
                .iter()
                .map(|(udi, ty)| {
                    let object: Arc<dyn DeviceObject> = Arc::new(Plain {
                        udi: udi.to_string(),
                        types: BTreeSet::from([InterfaceType::GenericInterface, *ty]),
                    });
                    (udi.to_string(), object)
                })
                .collect();
            let types: BTreeSet<InterfaceType> = devices.iter().map(|(_, ty)| *ty).collect();
            Arc::new(Self {
                descriptor: BackendDescriptor::new(prefix, types),
                objects: Mutex::new(objects),
                events: Mutex::new(Vec::new()),
            })
        }

        fn remove(&self, udi: &str) {
            self.objects.lock().remove(udi);
            self.events.lock().push(DeviceEvent::removed(udi));
        }
    }

    impl Backend for StaticBackend {
        fn descriptor(&self) -> &BackendDescriptor {
            &self.descriptor
        }

        fn all_devices(&self) -> Vec<String> {
            let mut ids: Vec<String> = self.objects.lock().keys().cloned().collect();
            ids.sort();
            ids
        }

        fn create_device(&self, udi: &str) -> Option<Arc<dyn DeviceObject>> {
            self.objects.lock().get(udi).cloned()
        }

        fn devices_from_query(&self, _parent: Option<&str>, ty: Option<InterfaceType>) -> Vec<String> {
            self.all_devices()
                .into_iter()
                .filter(|udi| {
                    ty.map_or(true, |ty| {
                        self.objects
                            .lock()
                            .get(udi)
                            .is_some_and(|d| d.query_interface(ty))
                    })
                })
                .collect()
        }

        fn take_events(&self) -> Vec<DeviceEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    #[test]
    fn test_routing_uses_first_matching_prefix() {
        let broad = StaticBackend::new("/dev", &[("/dev/a", InterfaceType::Block)]);
        let narrow = StaticBackend::new("/dev/b", &[("/dev/b1", InterfaceType::Battery)]);
        let registry = Registry::new(vec![broad as Arc<dyn Backend>, narrow]);

        assert!(registry.find("/dev/a").is_valid());
        // Routed to the broad backend, which does not know it.
        assert!(!registry.find("/dev/b1").is_valid());
    }

    #[test]
    fn test_find_shares_slot() {
        let backend = StaticBackend::new("/s", &[("/s/a", InterfaceType::Block)]);
        let registry = Registry::new(vec![backend as Arc<dyn Backend>]);

        let a = registry.find("/s/a");
        let b = registry.find("/s/a");
        assert!(a.same_device(&b));
        assert_eq!(a.ref_count(), 2);
        drop(b);
        assert_eq!(a.ref_count(), 1);
    }

    #[test]
    fn test_removed_event_invalidates_handles() {
        let backend = StaticBackend::new("/s", &[("/s/a", InterfaceType::Block)]);
        let registry = Registry::new(vec![backend.clone() as Arc<dyn Backend>]);

        let handle = registry.find("/s/a");
        assert!(handle.is_valid());

        backend.remove("/s/a");
        assert_eq!(registry.process_events(), 1);
        assert!(!handle.is_valid());
        assert_eq!(handle.udi(), "/s/a");
    }

    #[test]
    fn test_list_from_type_skips_unsupporting_backends() {
        let disks = StaticBackend::new("/disks", &[("/disks/a", InterfaceType::Block)]);
        let power = StaticBackend::new("/power", &[("/power/bat0", InterfaceType::Battery)]);
        let registry = Registry::new(vec![disks as Arc<dyn Backend>, power]);

        let batteries = registry.list_from_type(InterfaceType::Battery, None);
        assert_eq!(batteries.len(), 1);
        assert_eq!(batteries[0].udi(), "/power/bat0");
    }

    #[test]
    fn test_teardown_invalidates_everything() {
        let backend = StaticBackend::new("/s", &[("/s/a", InterfaceType::Block)]);
        let registry = Registry::new(vec![backend as Arc<dyn Backend>]);
        let handle = registry.find("/s/a");

        registry.teardown();
        assert!(!handle.is_valid());
        assert!(registry.backends().is_empty());
        assert!(registry.all_devices().is_empty());
    }

    #[test]
    fn test_trailing_separator() {
        let sep = MAIN_SEPARATOR.to_string();
        assert_eq!(with_trailing_separator(&format!("{}mnt", sep)), format!("{}mnt{}", sep, sep));
        assert_eq!(with_trailing_separator(&sep), sep);
    }
}
