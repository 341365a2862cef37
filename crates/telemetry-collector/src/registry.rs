// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-device state, created lazily on first sighting.

use crate::reorder::ReorderBuffer;
use std::collections::HashMap;
use std::time::Instant;

/// The most recently emitted real reading triple, used as the left
/// endpoint for interpolation. Any component may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadingTriple {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub voltage: Option<f32>,
}

/// Per-device accounting counters, mirrored at the process level by
/// the metrics accumulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCounters {
    pub received: u64,
    pub duplicates: u64,
    pub missing_positions: u64,
    pub bytes: u64,
}

/// The per-device record owned by the registry.
pub struct DeviceState {
    pub last_emitted_sequence: Option<u32>,
    pub last_known_values: ReadingTriple,
    pub buffer: ReorderBuffer,
    pub gap_opened_at: Option<Instant>,
    pub batch_mode: bool,
    pub counters: DeviceCounters,
}

impl DeviceState {
    fn new(buffer_capacity: u32) -> Self {
        Self {
            last_emitted_sequence: None,
            last_known_values: ReadingTriple::default(),
            buffer: ReorderBuffer::new(buffer_capacity),
            gap_opened_at: None,
            batch_mode: false,
            counters: DeviceCounters::default(),
        }
    }
}

/// Owns one [`DeviceState`] per observed device id, created lazily.
pub struct DeviceRegistry {
    devices: HashMap<u16, DeviceState>,
    buffer_capacity: u32,
}

impl DeviceRegistry {
    pub fn new(buffer_capacity: u32) -> Self {
        Self {
            devices: HashMap::new(),
            buffer_capacity,
        }
    }

    /// Return the device's state, creating a default-valued record on
    /// first sighting. Creation alone never emits a row.
    pub fn get_or_create(&mut self, device_id: u16) -> &mut DeviceState {
        self.devices
            .entry(device_id)
            .or_insert_with(|| DeviceState::new(self.buffer_capacity))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&u16, &mut DeviceState)> {
        self.devices.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u16, &DeviceState)> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_created_lazily_with_none_state() {
        let mut registry = DeviceRegistry::new(16);
        assert!(registry.is_empty());
        let state = registry.get_or_create(3001);
        assert_eq!(state.last_emitted_sequence, None);
        assert_eq!(state.last_known_values, ReadingTriple::default());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn repeated_lookup_returns_same_record() {
        let mut registry = DeviceRegistry::new(16);
        registry.get_or_create(3001).last_emitted_sequence = Some(5);
        assert_eq!(
            registry.get_or_create(3001).last_emitted_sequence,
            Some(5)
        );
        assert_eq!(registry.len(), 1);
    }
}
