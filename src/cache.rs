//! Latest decoded reading per device.
//!
//! The only mutable shared state in the bridge. Written by the single
//! dispatch path, read by the HTTP handlers. Each entry is replaced whole
//! under the lock, so a reader sees either the previous or the new reading,
//! never a mix. Entries are created empty at startup and live for the
//! process; there is no expiry.

use crate::profile::Device;
use crate::protocol::Reading;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct StateCache {
    inner: RwLock<HashMap<Device, Reading>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached reading for `device`.
    pub fn update(&self, device: Device, reading: Reading) {
        self.inner
            .write()
            .expect("state cache lock poisoned")
            .insert(device, reading);
    }

    /// Returns a copy of the latest reading, or `None` before the first
    /// valid response.
    pub fn get(&self, device: Device) -> Option<Reading> {
        self.inner
            .read()
            .expect("state cache lock poisoned")
            .get(&device)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Mode;

    #[test]
    fn empty_until_first_update() {
        let cache = StateCache::new();
        assert_eq!(cache.get(Device::Sv1), None);
    }

    #[test]
    fn update_overwrites_whole_reading() {
        let cache = StateCache::new();
        cache.update(
            Device::Pump,
            Reading {
                mode: Mode::Local,
                coils: vec![1, 0],
            },
        );
        cache.update(
            Device::Pump,
            Reading {
                mode: Mode::Remote,
                coils: vec![0, 1],
            },
        );
        let reading = cache.get(Device::Pump).unwrap();
        assert_eq!(reading.mode, Mode::Remote);
        assert_eq!(reading.coils, vec![0, 1]);
        // Other devices are untouched.
        assert_eq!(cache.get(Device::Sv2), None);
    }
}
