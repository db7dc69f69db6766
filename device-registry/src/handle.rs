//! Identity-stable device handles
//!
//! Every identifier the registry has handed out lives in one arena slot. All
//! handles for the same identifier share that slot, so they agree on
//! validity: when the backend removes the device every handle turns invalid
//! at once, and when it comes back every handle is valid again.
//!
//! # Architecture
//!
//! ```text
//! DeviceHandle ──┐
//! DeviceHandle ──┼──► Slot { refs, backing: Weak<dyn DeviceObject> } ──► backend-owned object
//! DeviceHandle ──┘
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use device_backend::{
    DeviceObject, FetchMode, InterfaceType, OpticalDisc, PropertyValue, StorageAccess,
};

use crate::registry::Shared;

// ============================================================================
// Arena
// ============================================================================

struct Slot {
    refs: usize,
    backing: Option<Weak<dyn DeviceObject>>,
}

impl Slot {
    fn upgrade(&self) -> Option<Arc<dyn DeviceObject>> {
        self.backing.as_ref().and_then(Weak::upgrade)
    }

    fn is_valid(&self) -> bool {
        self.backing.as_ref().is_some_and(|w| w.strong_count() > 0)
    }
}

/// Identifier -> shared slot
///
/// A slot is dropped once nothing references it and it has no live backing
/// object. Slots that are still valid outlive their handles so a later
/// lookup needs no backend call.
#[derive(Default)]
pub(crate) struct HandleArena {
    slots: HashMap<String, Slot>,
}

impl HandleArena {
    /// Take a reference on an existing slot
    pub(crate) fn acquire(&mut self, udi: &str) -> bool {
        match self.slots.get_mut(udi) {
            Some(slot) => {
                slot.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Take a reference, creating the slot with `backing` if needed
    ///
    /// An existing invalid slot adopts `backing`.
    pub(crate) fn acquire_or_insert(&mut self, udi: &str, backing: Option<Weak<dyn DeviceObject>>) {
        let slot = self.slots.entry(udi.to_string()).or_insert(Slot {
            refs: 0,
            backing: None,
        });
        if !slot.is_valid() {
            slot.backing = backing;
        }
        slot.refs += 1;
    }

    pub(crate) fn release(&mut self, udi: &str) {
        let Some(slot) = self.slots.get_mut(udi) else {
            return;
        };
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 && !slot.is_valid() {
            self.slots.remove(udi);
        }
    }

    pub(crate) fn backing(&self, udi: &str) -> Option<Arc<dyn DeviceObject>> {
        self.slots.get(udi).and_then(Slot::upgrade)
    }

    pub(crate) fn ref_count(&self, udi: &str) -> usize {
        self.slots.get(udi).map_or(0, |slot| slot.refs)
    }

    /// Whether a slot exists but has lost its backing object
    pub(crate) fn needs_backing(&self, udi: &str) -> bool {
        self.slots.get(udi).is_some_and(|slot| !slot.is_valid())
    }

    pub(crate) fn set_backing(&mut self, udi: &str, backing: Option<Weak<dyn DeviceObject>>) {
        if let Some(slot) = self.slots.get_mut(udi) {
            slot.backing = backing;
        }
    }

    /// Detach the backing object; unreferenced slots go away
    pub(crate) fn invalidate(&mut self, udi: &str) {
        let Some(slot) = self.slots.get_mut(udi) else {
            return;
        };
        slot.backing = None;
        if slot.refs == 0 {
            self.slots.remove(udi);
        }
    }

    pub(crate) fn invalidate_all(&mut self) {
        self.slots.retain(|_, slot| {
            slot.backing = None;
            slot.refs > 0
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

// ============================================================================
// DeviceHandle
// ============================================================================

/// A reference-counted handle to one device identifier
///
/// Cloning and dropping adjust the shared slot's reference count. A handle
/// stays usable after its device disappears; it just reports itself invalid
/// and every accessor returns an empty value.
pub struct DeviceHandle {
    udi: String,
    shared: Option<Arc<Shared>>,
}

impl DeviceHandle {
    /// The handle for the empty identifier
    pub fn null() -> Self {
        Self {
            udi: String::new(),
            shared: None,
        }
    }

    /// Wrap a slot that has already been acquired for this handle
    pub(crate) fn from_acquired(udi: &str, shared: Arc<Shared>) -> Self {
        Self {
            udi: udi.to_string(),
            shared: Some(shared),
        }
    }

    pub fn udi(&self) -> &str {
        &self.udi
    }

    /// The backing object, if the device is currently present
    pub fn backing(&self) -> Option<Arc<dyn DeviceObject>> {
        let shared = self.shared.as_ref()?;
        shared.arena.lock().backing(&self.udi)
    }

    pub fn is_valid(&self) -> bool {
        self.backing().is_some()
    }

    /// Number of live handles sharing this handle's slot
    pub fn ref_count(&self) -> usize {
        match &self.shared {
            Some(shared) => shared.arena.lock().ref_count(&self.udi),
            None => 0,
        }
    }

    /// Whether both handles refer to the same identifier in the same registry
    pub fn same_device(&self, other: &DeviceHandle) -> bool {
        let same_registry = match (&self.shared, &other.shared) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_registry && self.udi == other.udi
    }

    pub fn interfaces(&self) -> BTreeSet<InterfaceType> {
        self.backing()
            .map(|device| device.interfaces())
            .unwrap_or_default()
    }

    pub fn is_device_interface(&self, ty: InterfaceType) -> bool {
        self.backing().is_some_and(|device| device.query_interface(ty))
    }

    /// Read a property, fetching it from the backend if needed
    pub fn property(&self, ty: InterfaceType, name: &str) -> Option<PropertyValue> {
        self.backing()?.property(ty, name, FetchMode::FetchIfNeeded)
    }

    pub fn parent_udi(&self) -> Option<String> {
        self.backing()?.parent_udi()
    }

    /// Handle for the parent device; the null handle for roots
    pub fn parent(&self) -> DeviceHandle {
        match (&self.shared, self.parent_udi()) {
            (Some(shared), Some(parent)) => shared.find(&parent),
            _ => DeviceHandle::null(),
        }
    }

    pub fn vendor(&self) -> String {
        self.backing().map(|d| d.vendor()).unwrap_or_default()
    }

    pub fn product(&self) -> String {
        self.backing().map(|d| d.product()).unwrap_or_default()
    }

    pub fn description(&self) -> String {
        self.backing().map(|d| d.description()).unwrap_or_default()
    }

    pub fn icon(&self) -> String {
        self.backing().map(|d| d.icon()).unwrap_or_default()
    }

    pub fn as_storage_access(&self) -> Option<StorageAccess> {
        StorageAccess::from_device(self.backing()?)
    }

    pub fn as_optical_disc(&self) -> Option<OpticalDisc> {
        OpticalDisc::from_device(self.backing()?)
    }
}

impl Clone for DeviceHandle {
    fn clone(&self) -> Self {
        if let Some(shared) = &self.shared {
            shared.arena.lock().acquire(&self.udi);
        }
        Self {
            udi: self.udi.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Some(shared) = &self.shared {
            shared.arena.lock().release(&self.udi);
        }
    }
}

impl PartialEq for DeviceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_device(other)
    }
}

impl Eq for DeviceHandle {}

impl Default for DeviceHandle {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("udi", &self.udi)
            .field("valid", &self.is_valid())
            .finish()
    }
}
