//! Removable media detection
//!
//! Some services report media insertion and ejection only as a size change
//! on the baseline interface. Before turning such a change into an add or
//! remove, the cache asks a `MediaDetector` whether the device could be
//! removable media at all.

use serde::{Deserialize, Serialize};
use tracing::debug;

use device_backend::PropertyValue;

use crate::snapshot::{CachedValue, Snapshot};
use crate::source::ObjectSource;

/// Decides whether a device may hold removable media
pub trait MediaDetector: Send + Sync {
    /// `cached` is the device's snapshot when it is tracked
    fn might_be_removable_media(
        &self,
        source: &dyn ObjectSource,
        udi: &str,
        baseline_interface: &str,
        cached: Option<&Snapshot>,
    ) -> bool;
}

/// Follow the device's drive and inspect its media compatibility list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovableMediaRule {
    /// Baseline property pointing at the drive object
    pub drive_property: String,
    /// Interface of the drive object
    pub drive_interface: String,
    /// Drive property listing supported media kinds
    pub compatibility_property: String,
    /// A media kind starting with any of these counts as removable
    pub removable_prefixes: Vec<String>,
}

impl Default for RemovableMediaRule {
    fn default() -> Self {
        Self {
            drive_property: "Drive".to_string(),
            drive_interface: "org.freedesktop.UDisks2.Drive".to_string(),
            compatibility_property: "MediaCompatibility".to_string(),
            removable_prefixes: vec!["optical".to_string()],
        }
    }
}

impl RemovableMediaRule {
    fn drive_path(
        &self,
        source: &dyn ObjectSource,
        udi: &str,
        baseline_interface: &str,
        cached: Option<&Snapshot>,
    ) -> Option<String> {
        let cached = cached
            .and_then(|s| s.value(baseline_interface, &self.drive_property))
            .and_then(CachedValue::resolved)
            .cloned();

        let value = match cached {
            Some(value) => value,
            None => source
                .get_property(udi, baseline_interface, &self.drive_property)
                .ok()?
                .sanitize(),
        };

        value
            .as_str()
            .filter(|path| !path.is_empty() && *path != "/")
            .map(str::to_string)
    }
}

impl MediaDetector for RemovableMediaRule {
    fn might_be_removable_media(
        &self,
        source: &dyn ObjectSource,
        udi: &str,
        baseline_interface: &str,
        cached: Option<&Snapshot>,
    ) -> bool {
        let Some(drive) = self.drive_path(source, udi, baseline_interface, cached) else {
            debug!("{} has no drive, not removable media", udi);
            return false;
        };

        let compatibility = match source.get_property(&drive, &self.drive_interface, &self.compatibility_property) {
            Ok(PropertyValue::StrList(list)) => list,
            Ok(PropertyValue::Str(single)) => vec![single],
            _ => return false,
        };

        compatibility.iter().any(|media| {
            self.removable_prefixes
                .iter()
                .any(|prefix| media.starts_with(prefix.as_str()))
        })
    }
}
