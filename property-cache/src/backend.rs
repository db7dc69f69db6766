//! `Backend` implementation on top of `PropertyCache`
//!
//! `CachedBackend` owns every device object it hands out. The registry only
//! keeps weak references, so an object goes away as soon as its identifier
//! leaves the cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use device_backend::{
    Backend, BackendDescriptor, DeviceEvent, DeviceObject, FetchMode, InterfaceType, PropertyValue,
    StorageAccess,
};

use crate::cache::PropertyCache;
use crate::config::{CacheConfig, RootDeviceInfo};
use crate::event::RawEvent;
use crate::source::ObjectSource;

/// A backend serving devices from one cached platform service
pub struct CachedBackend<S: ObjectSource + 'static> {
    descriptor: BackendDescriptor,
    cache: Arc<PropertyCache<S>>,
    objects: Mutex<HashMap<String, Arc<dyn DeviceObject>>>,
    event_tx: Sender<DeviceEvent>,
    event_rx: Mutex<Receiver<DeviceEvent>>,
}

impl<S: ObjectSource + 'static> CachedBackend<S> {
    pub fn new(source: Arc<S>, config: CacheConfig) -> Self {
        Self::from_cache(PropertyCache::new(source, config))
    }

    pub fn from_cache(cache: PropertyCache<S>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            descriptor: cache.config().descriptor(),
            cache: Arc::new(cache),
            objects: Mutex::new(HashMap::new()),
            event_tx,
            event_rx: Mutex::new(event_rx),
        }
    }

    pub fn cache(&self) -> &Arc<PropertyCache<S>> {
        &self.cache
    }

    /// Feed one raw notification through the cache
    ///
    /// Objects of identifiers that left the cache are released before the
    /// resulting events are queued. Returns the number of events queued.
    pub fn handle(&self, event: RawEvent) -> usize {
        let events = self.cache.handle(event);

        for event in &events {
            if let DeviceEvent::Removed(udi) = event {
                if !self.cache.tracks(udi) && self.objects.lock().remove(udi).is_some() {
                    debug!("Released device object for {}", udi);
                }
            }
        }

        let count = events.len();
        for event in events {
            // The receiver lives as long as `self`.
            let _ = self.event_tx.send(event);
        }
        count
    }

    fn device(&self, udi: &str) -> CachedDevice<S> {
        CachedDevice {
            udi: udi.to_string(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S: ObjectSource + 'static> Backend for CachedBackend<S> {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn all_devices(&self) -> Vec<String> {
        let devices = self.cache.resync();
        self.objects.lock().retain(|udi, _| {
            *udi == self.descriptor.identifier_prefix || self.cache.tracks(udi)
        });
        devices
    }

    fn create_device(&self, udi: &str) -> Option<Arc<dyn DeviceObject>> {
        if let Some(existing) = self.objects.lock().get(udi) {
            return Some(Arc::clone(existing));
        }

        let object: Arc<dyn DeviceObject> = if udi == self.descriptor.identifier_prefix {
            Arc::new(RootDevice::new(udi, self.cache.config().root.clone()))
        } else if self.cache.contains(udi) {
            Arc::new(self.device(udi))
        } else {
            trace!("{} is not tracked, no device object", udi);
            return None;
        };

        let mut objects = self.objects.lock();
        let object = objects.entry(udi.to_string()).or_insert(object);
        Some(Arc::clone(object))
    }

    fn devices_from_query(&self, parent: Option<&str>, ty: Option<InterfaceType>) -> Vec<String> {
        let ids = self.cache.device_ids();
        let reports = |device: &CachedDevice<S>| ty.map_or(true, |ty| device.query_interface(ty));

        match parent {
            Some(parent) => ids
                .into_iter()
                .filter(|udi| {
                    let device = self.device(udi);
                    reports(&device) && device.parent_udi().as_deref() == Some(parent)
                })
                .collect(),
            None if ty.is_some() => ids
                .into_iter()
                .filter(|udi| reports(&self.device(udi)))
                .collect(),
            None => ids,
        }
    }

    fn take_events(&self) -> Vec<DeviceEvent> {
        self.event_rx.lock().try_iter().collect()
    }
}

// ============================================================================
// Device objects
// ============================================================================

/// A tracked identifier viewed through the cache
pub struct CachedDevice<S: ObjectSource> {
    udi: String,
    cache: Arc<PropertyCache<S>>,
}

impl<S: ObjectSource> CachedDevice<S> {
    fn text(&self, property: &str) -> Option<String> {
        self.cache
            .find_property(&self.udi, property, FetchMode::FetchIfNeeded)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty())
    }

    fn raw_property(&self, ty: InterfaceType, name: &str, mode: FetchMode) -> Option<PropertyValue> {
        self.cache
            .config()
            .raw_interfaces(ty)
            .filter(|raw| self.cache.has_interface(&self.udi, raw))
            .find_map(|raw| self.cache.get(&self.udi, raw, name, mode))
    }

    /// Mount points from the configured list property, `None` if unreported
    fn mount_points(&self, mode: FetchMode) -> Option<Vec<String>> {
        let property = self.cache.config().mount_points_property.as_deref()?;
        let points = match self.raw_property(InterfaceType::StorageAccess, property, mode)? {
            PropertyValue::StrList(points) => points,
            PropertyValue::Str(point) => vec![point],
            PropertyValue::Bytes(bytes) => split_byte_strings(&bytes),
            _ => return None,
        };
        Some(points.into_iter().filter(|p| !p.is_empty()).collect())
    }
}

/// Split concatenated NUL-terminated byte strings into text
fn split_byte_strings(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|b| *b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

impl<S: ObjectSource> DeviceObject for CachedDevice<S> {
    fn udi(&self) -> &str {
        &self.udi
    }

    fn parent_udi(&self) -> Option<String> {
        let config = self.cache.config();
        let parent = config.parent_property.as_deref().and_then(|property| {
            self.cache
                .get(&self.udi, &config.baseline_interface, property, FetchMode::FetchIfNeeded)
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|path| !path.is_empty() && path != "/")
        });
        Some(parent.unwrap_or_else(|| config.identifier_prefix.clone()))
    }

    fn vendor(&self) -> String {
        self.text("Vendor").unwrap_or_default()
    }

    fn product(&self) -> String {
        self.text("Model").unwrap_or_default()
    }

    fn description(&self) -> String {
        self.text("IdLabel")
            .or_else(|| self.text("Model"))
            .unwrap_or_else(|| {
                self.udi
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
    }

    fn icon(&self) -> String {
        let interfaces = self.interfaces();
        let icon = if interfaces.contains(&InterfaceType::OpticalDisc) {
            "media-optical"
        } else if interfaces.contains(&InterfaceType::OpticalDrive) {
            "drive-optical"
        } else if interfaces.contains(&InterfaceType::StorageDrive)
            || interfaces.contains(&InterfaceType::StorageVolume)
            || interfaces.contains(&InterfaceType::StorageAccess)
        {
            "drive-harddisk"
        } else {
            ""
        };
        icon.to_string()
    }

    fn interfaces(&self) -> BTreeSet<InterfaceType> {
        let config = self.cache.config();
        let mut types: BTreeSet<InterfaceType> = self
            .cache
            .interfaces(&self.udi)
            .iter()
            .filter_map(|raw| config.interface_type(raw))
            .collect();
        types.insert(InterfaceType::GenericInterface);
        types
    }

    fn property(&self, ty: InterfaceType, name: &str, mode: FetchMode) -> Option<PropertyValue> {
        if ty == InterfaceType::GenericInterface {
            return self.cache.find_property(&self.udi, name, mode);
        }

        let direct = self.raw_property(ty, name, mode);
        if direct.is_some() || ty != InterfaceType::StorageAccess {
            return direct;
        }

        match name {
            StorageAccess::FILE_PATH => Some(PropertyValue::Str(
                self.mount_points(mode)?.into_iter().next().unwrap_or_default(),
            )),
            StorageAccess::ACCESSIBLE => Some(PropertyValue::Bool(!self.mount_points(mode)?.is_empty())),
            _ => None,
        }
    }
}

/// The synthetic device standing for the backend itself
pub struct RootDevice {
    udi: String,
    info: RootDeviceInfo,
}

impl RootDevice {
    pub fn new(udi: impl Into<String>, info: RootDeviceInfo) -> Self {
        Self {
            udi: udi.into(),
            info,
        }
    }
}

impl DeviceObject for RootDevice {
    fn udi(&self) -> &str {
        &self.udi
    }

    fn parent_udi(&self) -> Option<String> {
        None
    }

    fn product(&self) -> String {
        self.info.product.clone()
    }

    fn description(&self) -> String {
        self.info.description.clone()
    }

    fn icon(&self) -> String {
        self.info.icon.clone()
    }

    fn interfaces(&self) -> BTreeSet<InterfaceType> {
        BTreeSet::from([InterfaceType::GenericInterface])
    }

    fn property(&self, _ty: InterfaceType, _name: &str, _mode: FetchMode) -> Option<PropertyValue> {
        None
    }
}
