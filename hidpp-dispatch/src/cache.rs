//! Caches the feature table of every device reachable through a channel.
//!
//! Entries are added lazily whenever a feature ID is mapped with Root
//! `GetFeature`. Features a device reported as absent are remembered as well,
//! so repeated lookups do not cost another round trip.

use std::{collections::HashMap, sync::Mutex};

use tracing::debug;

/// What is known about a single feature ID on a device.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FeatureEntry {
    /// The feature lives at `index` and is implemented in `version`.
    Supported { index: u8, version: u8 },

    /// The device reported the feature as absent.
    Unsupported,
}

#[derive(Default, Debug)]
struct DeviceFeatures {
    by_id: HashMap<u16, FeatureEntry>,
    by_index: HashMap<u8, (u16, u8)>,
}

/// The feature-index mapping of all devices on a channel.
#[derive(Default, Debug)]
pub struct FeatureCache {
    devices: Mutex<HashMap<u8, DeviceFeatures>>,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a feature ID on a device.
    pub fn get(&self, device_index: u8, feature_id: u16) -> Option<FeatureEntry> {
        let devices = self.devices.lock().unwrap();
        devices
            .get(&device_index)
            .and_then(|device| device.by_id.get(&feature_id))
            .copied()
    }

    /// Looks up the feature ID and version living at a feature index.
    pub fn lookup_index(&self, device_index: u8, feature_index: u8) -> Option<(u16, u8)> {
        let devices = self.devices.lock().unwrap();
        devices
            .get(&device_index)
            .and_then(|device| device.by_index.get(&feature_index))
            .copied()
    }

    /// Records that `feature_id` lives at `index` in `version`.
    ///
    /// Any other feature previously cached at the same index is forgotten.
    pub fn insert_supported(&self, device_index: u8, feature_id: u16, index: u8, version: u8) {
        let mut devices = self.devices.lock().unwrap();
        let device = devices.entry(device_index).or_default();

        if let Some((stale_id, _)) = device.by_index.insert(index, (feature_id, version)) {
            if stale_id != feature_id {
                debug!(
                    device_index,
                    index, stale_id, feature_id, "replacing stale feature mapping"
                );
                device.by_id.remove(&stale_id);
            }
        }

        if let Some(FeatureEntry::Supported { index: old, .. }) = device
            .by_id
            .insert(feature_id, FeatureEntry::Supported { index, version })
        {
            if old != index {
                device.by_index.remove(&old);
            }
        }
    }

    /// Records that `feature_id` is absent on a device.
    pub fn insert_unsupported(&self, device_index: u8, feature_id: u16) {
        let mut devices = self.devices.lock().unwrap();
        let device = devices.entry(device_index).or_default();

        if let Some(FeatureEntry::Supported { index, .. }) =
            device.by_id.insert(feature_id, FeatureEntry::Unsupported)
        {
            device.by_index.remove(&index);
        }
    }

    /// Forgets everything known about a single device.
    pub fn invalidate_device(&self, device_index: u8) {
        if self.devices.lock().unwrap().remove(&device_index).is_some() {
            debug!(device_index, "feature cache invalidated");
        }
    }

    /// Forgets everything.
    pub fn clear(&self) {
        self.devices.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.devices
            .lock()
            .unwrap()
            .values()
            .all(|device| device.by_id.is_empty())
    }
}
