//! Per-backend property cache and the reconciliation protocol
//!
//! The cache mirrors `device -> interface -> property -> value` for one
//! platform service and folds the service's raw notifications into it.
//! Every handler returns the registry-level events the notification produced,
//! in the order they must be delivered.
//!
//! # Architecture
//!
//! ```text
//! PropertyCache<S>
//!     │
//!     ├── devices: BTreeMap<udi, Snapshot>
//!     │       └── Snapshot: interface -> property -> CachedValue
//!     │
//!     ├── inflight: HashSet<(udi, interface, property)>   one fetch per key
//!     │
//!     └── source: S (ObjectSource)                          blocking calls
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use device_backend::{
    ChangeKind, DeviceEvent, FetchMode, InterfaceMap, PropertyChanges, PropertyMap, PropertyValue,
};

use crate::config::CacheConfig;
use crate::event::RawEvent;
use crate::media::MediaDetector;
use crate::snapshot::{CachedValue, Snapshot};
use crate::source::ObjectSource;

type FetchKey = (String, String, String);

#[derive(Default)]
struct CacheState {
    devices: BTreeMap<String, Snapshot>,
    inflight: HashSet<FetchKey>,
}

/// Claim on one in-flight fetch; releasing it wakes the waiters, also when
/// the source call unwinds
struct InflightGuard<'a> {
    state: &'a Mutex<CacheState>,
    fetched: &'a Condvar,
    key: FetchKey,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().inflight.remove(&self.key);
        self.fetched.notify_all();
    }
}

/// Interface/property cache for one platform service
pub struct PropertyCache<S: ObjectSource> {
    source: Arc<S>,
    config: Arc<CacheConfig>,
    detector: Box<dyn MediaDetector>,
    state: Mutex<CacheState>,
    fetched: Condvar,
}

impl<S: ObjectSource> PropertyCache<S> {
    /// Create a cache using the configuration's removable-media rule
    pub fn new(source: Arc<S>, config: CacheConfig) -> Self {
        let detector = Box::new(config.removable_media.clone());
        Self::with_detector(source, config, detector)
    }

    /// Create a cache with a custom media heuristic
    pub fn with_detector(source: Arc<S>, config: CacheConfig, detector: Box<dyn MediaDetector>) -> Self {
        Self {
            source,
            config: Arc::new(config),
            detector,
            state: Mutex::new(CacheState::default()),
            fetched: Condvar::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    // ==================== Resync and queries ====================

    /// Drop everything and reload from the service
    ///
    /// A failing service leaves the cache empty.
    pub fn resync(&self) -> Vec<String> {
        let objects = match self.source.managed_objects() {
            Ok(objects) => objects,
            Err(err) => {
                warn!("Resync of {} failed: {}", self.config.identifier_prefix, err);
                BTreeMap::new()
            }
        };

        let mut state = self.state.lock();
        state.devices.clear();
        for (udi, interfaces) in objects {
            if !self.config.is_tracked_root(&udi) || self.config.is_ignored(&udi) {
                continue;
            }
            let interfaces = PropertyValue::sanitize_interfaces(interfaces);
            state.devices.insert(udi, Snapshot::from_interfaces(interfaces));
        }

        debug!(
            "Resynced {}: {} devices",
            self.config.identifier_prefix,
            state.devices.len()
        );
        state.devices.keys().cloned().collect()
    }

    /// Resync when nothing is cached yet
    fn ensure_synced(&self) {
        let empty = self.state.lock().devices.is_empty();
        if empty {
            self.resync();
        }
    }

    /// Identifiers currently tracked
    pub fn device_ids(&self) -> Vec<String> {
        self.ensure_synced();
        self.state.lock().devices.keys().cloned().collect()
    }

    pub fn contains(&self, udi: &str) -> bool {
        self.ensure_synced();
        self.state.lock().devices.contains_key(udi)
    }

    /// A copy of one device's snapshot
    pub fn snapshot(&self, udi: &str) -> Option<Snapshot> {
        self.ensure_synced();
        self.state.lock().devices.get(udi).cloned()
    }

    /// Raw interface names of one device
    pub fn interfaces(&self, udi: &str) -> Vec<String> {
        self.state
            .lock()
            .devices
            .get(udi)
            .map(|s| s.interface_names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_interface(&self, udi: &str, interface: &str) -> bool {
        self.state
            .lock()
            .devices
            .get(udi)
            .is_some_and(|s| s.has_interface(interface))
    }

    /// Whether `udi` is tracked, without triggering a resync
    pub fn tracks(&self, udi: &str) -> bool {
        self.state.lock().devices.contains_key(udi)
    }

    /// Number of tracked devices, without triggering a resync
    pub fn tracked_count(&self) -> usize {
        self.state.lock().devices.len()
    }

    // ==================== Fetch policy ====================

    /// Read one property
    ///
    /// Untracked devices and interfaces the device does not have are answered
    /// without a remote call. In `FetchIfNeeded` mode an unresolved or unknown
    /// property of a present interface is fetched and cached; failures are
    /// cached as absent. Concurrent callers for the same key share one fetch.
    pub fn get(
        &self,
        udi: &str,
        interface: &str,
        property: &str,
        mode: FetchMode,
    ) -> Option<PropertyValue> {
        let key: FetchKey = (udi.to_string(), interface.to_string(), property.to_string());

        let inflight = {
            let mut state = self.state.lock();
            loop {
                let slot = {
                    let snapshot = state.devices.get(udi)?;
                    if !snapshot.has_interface(interface) {
                        return None;
                    }
                    snapshot.value(interface, property).cloned()
                };

                match slot {
                    Some(CachedValue::Resolved(value)) => return Some(value),
                    Some(CachedValue::Absent) => return None,
                    Some(CachedValue::Unresolved) | None => {
                        if mode == FetchMode::CachedOnly {
                            return None;
                        }
                        if state.inflight.contains(&key) {
                            self.fetched.wait(&mut state);
                            continue;
                        }
                        state.inflight.insert(key.clone());
                        break InflightGuard {
                            state: &self.state,
                            fetched: &self.fetched,
                            key,
                        };
                    }
                }
            }
        };

        trace!("Fetching {}.{} for {}", interface, property, udi);
        let slot = match self.source.get_property(udi, interface, property) {
            Ok(value) => CachedValue::Resolved(value.sanitize()),
            Err(err) => {
                warn!("Fetching {}.{} for {} failed: {}", interface, property, udi, err);
                CachedValue::Absent
            }
        };

        if let Some(snapshot) = self.state.lock().devices.get_mut(udi) {
            snapshot.set_existing(interface, property, slot.clone());
        }
        // Waiters wake to the stored value.
        drop(inflight);
        slot.into_resolved()
    }

    /// Read a property from whichever interface carries it
    pub fn find_property(&self, udi: &str, property: &str, mode: FetchMode) -> Option<PropertyValue> {
        let interface = {
            let state = self.state.lock();
            state.devices.get(udi)?.interface_with(property)?.to_string()
        };
        self.get(udi, &interface, property, mode)
    }

    // ==================== Reconciliation ====================

    /// Fold one raw notification into the cache
    pub fn handle(&self, event: RawEvent) -> Vec<DeviceEvent> {
        match event {
            RawEvent::InterfacesAdded { udi, interfaces } => self.interfaces_added(&udi, interfaces),
            RawEvent::InterfacesRemoved { udi, interfaces } => {
                self.interfaces_removed(&udi, &interfaces)
            }
            RawEvent::PropertiesChanged {
                udi,
                interface,
                changed,
                invalidated,
            } => self.properties_changed(&udi, &interface, changed, &invalidated),
        }
    }

    /// Interfaces appeared on an object
    ///
    /// Previously known interfaces (other than the baseline) are re-fetched so
    /// that by the time "added" goes out every interface is current. An
    /// interface whose re-fetch fails keeps its old data.
    pub fn interfaces_added(&self, udi: &str, interfaces: InterfaceMap) -> Vec<DeviceEvent> {
        if udi.is_empty() || self.config.is_ignored(udi) {
            return Vec::new();
        }

        debug!("{} has new interfaces: {:?}", udi, interfaces.keys().collect::<Vec<_>>());

        let readiness = interfaces.contains_key(&self.config.readiness_interface);
        let baseline = self.config.baseline_interface.as_str();

        let (is_new, stale) = {
            let mut state = self.state.lock();
            let is_new = !state.devices.contains_key(udi);
            let snapshot = state.devices.entry(udi.to_string()).or_default();

            let stale: Vec<String> = snapshot
                .interface_names()
                .filter(|name| *name != baseline)
                .map(str::to_string)
                .collect();

            for (name, props) in interfaces {
                if !self.config.in_namespace(&name) {
                    continue;
                }
                snapshot.replace_interface(name, PropertyValue::sanitize_map(props));
            }

            (is_new, stale)
        };

        for interface in stale {
            match self.source.get_all(udi, &interface) {
                Ok(props) => {
                    let mut state = self.state.lock();
                    if let Some(snapshot) = state.devices.get_mut(udi) {
                        snapshot.replace_interface(interface, PropertyValue::sanitize_map(props));
                    }
                }
                Err(err) => {
                    warn!("Re-fetching {} for {} failed, keeping cached data: {}", interface, udi, err);
                }
            }
        }

        if is_new || readiness {
            debug!("Emitting added for {} (new: {}, ready: {})", udi, is_new, readiness);
            vec![DeviceEvent::added(udi)]
        } else {
            Vec::new()
        }
    }

    /// Interfaces disappeared from an object
    ///
    /// Losing the last interface removes the device. Losing some of them is
    /// reported as a remove immediately followed by an add so that anything
    /// matching on composition is re-evaluated.
    pub fn interfaces_removed(&self, udi: &str, interfaces: &[String]) -> Vec<DeviceEvent> {
        if udi.is_empty() || self.config.is_ignored(udi) {
            return Vec::new();
        }

        let mut state = self.state.lock();
        let Some(snapshot) = state.devices.get_mut(udi) else {
            return Vec::new();
        };

        debug!("{} lost interfaces: {:?}", udi, interfaces);
        for interface in interfaces {
            snapshot.remove_interface(interface);
        }

        if snapshot.is_empty() {
            state.devices.remove(udi);
            debug!("{} has no interfaces left, emitting removed", udi);
            vec![DeviceEvent::removed(udi)]
        } else {
            vec![DeviceEvent::removed(udi), DeviceEvent::added(udi)]
        }
    }

    /// Properties of one interface changed or were invalidated
    pub fn properties_changed(
        &self,
        udi: &str,
        interface: &str,
        changed: PropertyMap,
        invalidated: &[String],
    ) -> Vec<DeviceEvent> {
        if udi.is_empty()
            || !udi.starts_with(&self.config.identifier_prefix)
            || self.config.is_ignored(udi)
        {
            return Vec::new();
        }

        let changed = PropertyValue::sanitize_map(changed);
        let mut events = Vec::new();

        let known = {
            let mut state = self.state.lock();
            match state.devices.get_mut(udi) {
                Some(snapshot) => {
                    let mut changes = PropertyChanges::new();

                    for name in invalidated {
                        snapshot.set(interface, name.clone(), CachedValue::Unresolved);
                        changes.insert(name.clone(), ChangeKind::Modified);
                    }

                    for (name, value) in &changed {
                        snapshot.set(interface, name.clone(), CachedValue::Resolved(value.clone()));
                        changes.insert(name.clone(), ChangeKind::Modified);
                    }

                    if !changes.is_empty() {
                        events.push(DeviceEvent::PropertyChanged {
                            udi: udi.to_string(),
                            changes,
                        });
                    }
                    true
                }
                None => false,
            }
        };

        if interface == self.config.baseline_interface {
            if let Some(size) = changed.get(&self.config.size_property) {
                events.extend(self.media_changed(udi, known, size.as_u64().unwrap_or(0), &changed));
            }
        }

        events
    }

    /// Media insertion/removal reported as a size change
    fn media_changed(&self, udi: &str, known: bool, size: u64, changed: &PropertyMap) -> Vec<DeviceEvent> {
        let inserted = !known && size > 0;
        let removed = known && size == 0;

        // Skip the detector unless one of the cheap conditions holds.
        if !inserted && !removed {
            return Vec::new();
        }

        let baseline = self.config.baseline_interface.as_str();
        let cached = if known {
            self.state.lock().devices.get(udi).cloned()
        } else {
            None
        };

        if !self
            .detector
            .might_be_removable_media(self.source.as_ref(), udi, baseline, cached.as_ref())
        {
            return Vec::new();
        }

        let mut state = self.state.lock();
        if inserted && !state.devices.contains_key(udi) {
            debug!("Media inserted in {}", udi);
            let mut snapshot = Snapshot::new();
            snapshot.replace_interface(baseline, changed.clone());
            state.devices.insert(udi.to_string(), snapshot);
            vec![DeviceEvent::added(udi)]
        } else if removed && state.devices.remove(udi).is_some() {
            debug!("Media removed from {}", udi);
            vec![DeviceEvent::removed(udi)]
        } else {
            Vec::new()
        }
    }
}

impl<S: ObjectSource> std::fmt::Debug for PropertyCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyCache")
            .field("prefix", &self.config.identifier_prefix)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, SourceCall};
    use std::collections::BTreeMap as Map;

    const BLOCK: &str = "org.freedesktop.UDisks2.Block";
    const FS: &str = "org.freedesktop.UDisks2.Filesystem";
    const PART: &str = "org.freedesktop.UDisks2.Partition";
    const D1: &str = "/org/freedesktop/UDisks2/block_devices/sda1";

    fn props(entries: &[(&str, PropertyValue)]) -> PropertyMap {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn ifaces(entries: Vec<(&str, PropertyMap)>) -> InterfaceMap {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn cache() -> (Arc<MemorySource>, PropertyCache<MemorySource>) {
        let source = Arc::new(MemorySource::new());
        let cache = PropertyCache::new(Arc::clone(&source), CacheConfig::default());
        (source, cache)
    }

    #[test]
    fn test_new_device_emits_single_added() {
        let (source, cache) = cache();
        let event = source.add_interfaces(
            D1,
            ifaces(vec![(BLOCK, props(&[("Size", 512u64.into())])), (FS, PropertyMap::new())]),
        );

        assert_eq!(cache.handle(event), vec![DeviceEvent::added(D1)]);
        assert!(cache.has_interface(D1, BLOCK));
        assert!(cache.has_interface(D1, FS));
    }

    #[test]
    fn test_readiness_interface_re_emits_added() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(D1, ifaces(vec![(BLOCK, PropertyMap::new())])));

        let events = cache.handle(source.add_interfaces(D1, ifaces(vec![(FS, PropertyMap::new())])));
        assert_eq!(events, vec![DeviceEvent::added(D1)]);
    }

    #[test]
    fn test_non_readiness_interface_on_known_device_is_silent() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(D1, ifaces(vec![(BLOCK, PropertyMap::new())])));

        let events = cache.handle(source.add_interfaces(D1, ifaces(vec![(PART, PropertyMap::new())])));
        assert!(events.is_empty());
        assert!(cache.has_interface(D1, PART));
    }

    #[test]
    fn test_added_refetches_old_interfaces_except_baseline() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(
            D1,
            ifaces(vec![(BLOCK, PropertyMap::new()), (PART, props(&[("Number", 1u64.into())]))]),
        ));

        // The service updated Partition without telling us.
        source.insert_object(
            D1,
            ifaces(vec![(BLOCK, PropertyMap::new()), (PART, props(&[("Number", 2u64.into())]))]),
        );
        source.clear_calls();

        cache.handle(source.add_interfaces(D1, ifaces(vec![(FS, PropertyMap::new())])));

        let calls = source.calls();
        assert_eq!(
            calls,
            vec![SourceCall::GetAll {
                udi: D1.to_string(),
                interface: PART.to_string()
            }]
        );
        assert_eq!(
            cache.get(D1, PART, "Number", FetchMode::CachedOnly),
            Some(PropertyValue::UInt(2))
        );
    }

    #[test]
    fn test_failed_refetch_keeps_stale_interface() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(
            D1,
            ifaces(vec![(BLOCK, PropertyMap::new()), (PART, props(&[("Number", 1u64.into())]))]),
        ));
        source.fail_get_all(PART);

        cache.handle(source.add_interfaces(D1, ifaces(vec![(FS, PropertyMap::new())])));

        assert_eq!(
            cache.get(D1, PART, "Number", FetchMode::CachedOnly),
            Some(PropertyValue::UInt(1))
        );
        assert!(cache.has_interface(D1, FS));
    }

    #[test]
    fn test_foreign_namespace_interfaces_are_filtered() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(
            D1,
            ifaces(vec![(BLOCK, PropertyMap::new()), ("org.freedesktop.DBus.Properties", PropertyMap::new())]),
        ));

        assert_eq!(cache.interfaces(D1), vec![BLOCK.to_string()]);
    }

    #[test]
    fn test_partial_removal_pairs_removed_and_added() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(D1, ifaces(vec![(BLOCK, PropertyMap::new()), (FS, PropertyMap::new())])));

        let events = cache.handle(source.remove_interfaces(D1, &[FS]));
        assert_eq!(events, vec![DeviceEvent::removed(D1), DeviceEvent::added(D1)]);
        assert_eq!(cache.interfaces(D1), vec![BLOCK.to_string()]);
    }

    #[test]
    fn test_full_removal_deletes_entry() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(D1, ifaces(vec![(BLOCK, PropertyMap::new())])));

        let events = cache.handle(source.remove_interfaces(D1, &[BLOCK]));
        assert_eq!(events, vec![DeviceEvent::removed(D1)]);
        assert_eq!(cache.tracked_count(), 0);
    }

    #[test]
    fn test_removal_of_unknown_device_is_ignored() {
        let (_source, cache) = cache();
        let events = cache.interfaces_removed(D1, &[BLOCK.to_string()]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_jobs_are_ignored() {
        let (source, cache) = cache();
        let job = "/org/freedesktop/UDisks2/jobs/7";
        let events = cache.handle(source.add_interfaces(job, ifaces(vec![(BLOCK, PropertyMap::new())])));
        assert!(events.is_empty());
        assert_eq!(cache.tracked_count(), 0);
    }

    #[test]
    fn test_properties_changed_marks_and_reports() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(
            D1,
            ifaces(vec![(BLOCK, props(&[("IdLabel", "old".into()), ("Size", 10u64.into())]))]),
        ));

        let events = cache.properties_changed(
            D1,
            BLOCK,
            props(&[("Size", 20u64.into())]),
            &["IdLabel".to_string()],
        );

        let mut expected = PropertyChanges::new();
        expected.insert("Size".to_string(), ChangeKind::Modified);
        expected.insert("IdLabel".to_string(), ChangeKind::Modified);
        assert_eq!(
            events,
            vec![DeviceEvent::PropertyChanged {
                udi: D1.to_string(),
                changes: expected
            }]
        );

        let snapshot = cache.snapshot(D1).unwrap();
        assert!(snapshot.value(BLOCK, "IdLabel").unwrap().is_unresolved());
        assert_eq!(
            cache.get(D1, BLOCK, "Size", FetchMode::CachedOnly),
            Some(PropertyValue::UInt(20))
        );
    }

    #[test]
    fn test_properties_changed_outside_prefix_ignored() {
        let (_source, cache) = cache();
        let events = cache.properties_changed(
            "/org/other/thing",
            BLOCK,
            props(&[("Size", 1u64.into())]),
            &[],
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_fetch_if_needed_resolves_and_caches() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(D1, ifaces(vec![(BLOCK, props(&[("IdLabel", "a".into())]))])));
        cache.handle(source.invalidate_property(D1, BLOCK, "IdLabel", "b"));

        assert_eq!(cache.get(D1, BLOCK, "IdLabel", FetchMode::CachedOnly), None);
        assert_eq!(
            cache.get(D1, BLOCK, "IdLabel", FetchMode::FetchIfNeeded),
            Some(PropertyValue::from("b"))
        );
        assert_eq!(
            cache.get(D1, BLOCK, "IdLabel", FetchMode::CachedOnly),
            Some(PropertyValue::from("b"))
        );
        assert_eq!(source.property_fetches(D1, BLOCK, "IdLabel"), 1);
    }

    #[test]
    fn test_missing_property_is_negatively_cached() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(D1, ifaces(vec![(BLOCK, PropertyMap::new())])));

        assert_eq!(cache.get(D1, BLOCK, "Nope", FetchMode::FetchIfNeeded), None);
        assert_eq!(cache.get(D1, BLOCK, "Nope", FetchMode::FetchIfNeeded), None);
        assert_eq!(source.property_fetches(D1, BLOCK, "Nope"), 1);
        assert_eq!(
            cache.snapshot(D1).unwrap().value(BLOCK, "Nope"),
            Some(&CachedValue::Absent)
        );
    }

    #[test]
    fn test_untracked_lookup_makes_no_call() {
        let (source, cache) = cache();
        assert_eq!(cache.get(D1, BLOCK, "Size", FetchMode::FetchIfNeeded), None);
        assert!(source.calls().is_empty());
    }

    #[test]
    fn test_missing_interface_makes_no_call() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(D1, ifaces(vec![(BLOCK, PropertyMap::new())])));
        source.clear_calls();

        assert_eq!(cache.get(D1, FS, "MountPoints", FetchMode::FetchIfNeeded), None);
        assert!(source.calls().is_empty());
        assert!(!cache.has_interface(D1, FS));
    }

    #[test]
    fn test_find_property_searches_interfaces() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(
            D1,
            ifaces(vec![(BLOCK, PropertyMap::new()), (PART, props(&[("Number", 3u64.into())]))]),
        ));

        assert_eq!(
            cache.find_property(D1, "Number", FetchMode::CachedOnly),
            Some(PropertyValue::UInt(3))
        );
        assert_eq!(cache.find_property(D1, "Missing", FetchMode::FetchIfNeeded), None);
    }

    #[test]
    fn test_resync_filters_roots_and_sanitizes() {
        let (source, cache) = cache();
        source.insert_object(
            D1,
            ifaces(vec![(BLOCK, props(&[("Device", PropertyValue::Bytes(b"/dev/sda1\0".to_vec()))]))]),
        );
        source.insert_object("/org/freedesktop/UDisks2/Manager", ifaces(vec![(BLOCK, PropertyMap::new())]));

        assert_eq!(cache.resync(), vec![D1.to_string()]);
        assert_eq!(
            cache.get(D1, BLOCK, "Device", FetchMode::CachedOnly),
            Some(PropertyValue::from("/dev/sda1"))
        );
    }

    #[test]
    fn test_lazy_resync_on_first_query() {
        let (source, cache) = cache();
        source.insert_object(D1, ifaces(vec![(BLOCK, PropertyMap::new())]));

        assert_eq!(cache.tracked_count(), 0);
        assert!(cache.contains(D1));
        assert_eq!(cache.tracked_count(), 1);
    }

    fn optical_source() -> (Arc<MemorySource>, PropertyCache<MemorySource>) {
        let (source, cache) = cache();
        let mut drive = Map::new();
        drive.insert(
            "org.freedesktop.UDisks2.Drive".to_string(),
            props(&[(
                "MediaCompatibility",
                PropertyValue::StrList(vec!["optical_cd".to_string()]),
            )]),
        );
        source.insert_object("/org/freedesktop/UDisks2/drives/dvd", drive);
        source.insert_object(
            "/org/freedesktop/UDisks2/block_devices/sr0",
            ifaces(vec![(
                BLOCK,
                props(&[
                    ("Drive", "/org/freedesktop/UDisks2/drives/dvd".into()),
                    ("Size", 0u64.into()),
                ]),
            )]),
        );
        (source, cache)
    }

    #[test]
    fn test_media_inserted_and_removed() {
        let (source, cache) = optical_source();
        let sr0 = "/org/freedesktop/UDisks2/block_devices/sr0";

        // The empty tray is not tracked; a size report means media arrived.
        let events = cache.handle(source.set_property(sr0, BLOCK, "Size", 512u64));
        assert_eq!(events, vec![DeviceEvent::added(sr0)]);
        assert_eq!(cache.interfaces(sr0), vec![BLOCK.to_string()]);

        let events = cache.handle(source.set_property(sr0, BLOCK, "Size", 0u64));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DeviceEvent::PropertyChanged { .. }));
        assert_eq!(events[1], DeviceEvent::removed(sr0));
        assert_eq!(cache.tracked_count(), 0);
    }

    #[test]
    fn test_size_change_on_fixed_disk_is_plain_change() {
        let (source, cache) = cache();
        cache.handle(source.add_interfaces(D1, ifaces(vec![(BLOCK, props(&[("Size", 10u64.into())]))])));

        let events = cache.handle(source.set_property(D1, BLOCK, "Size", 0u64));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DeviceEvent::PropertyChanged { .. }));
        assert!(cache.has_interface(D1, BLOCK));
    }
}
