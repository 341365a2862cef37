// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deterministic reading generation, seeded per device.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use telemetry_wire::{SensorKind, SensorReading};

/// The uniform range sampled for a given sensor kind. Temperature's
/// `20.0..30.0` range mirrors the reference client; humidity and
/// voltage ranges are this emitter's own plausible sensor bounds (see
/// design notes).
fn range_for(kind: SensorKind) -> (f32, f32) {
    match kind {
        SensorKind::Temperature => (20.0, 30.0),
        SensorKind::Humidity => (30.0, 70.0),
        SensorKind::Voltage => (3.0, 3.6),
    }
}

/// Generates readings of one sensor kind from a seeded RNG.
pub struct ReadingGenerator {
    rng: StdRng,
    kind: SensorKind,
}

impl ReadingGenerator {
    pub fn new(seed: u64, kind: SensorKind) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            kind,
        }
    }

    pub fn next_reading(&mut self) -> SensorReading {
        let (low, high) = range_for(self.kind);
        let value = self.rng.gen_range(low..high);
        SensorReading::new(self.kind, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_same_sequence() {
        let mut a = ReadingGenerator::new(42, SensorKind::Temperature);
        let mut b = ReadingGenerator::new(42, SensorKind::Temperature);
        for _ in 0..5 {
            assert_eq!(a.next_reading().value, b.next_reading().value);
        }
    }

    #[test]
    fn readings_stay_within_declared_range() {
        let mut gen = ReadingGenerator::new(1, SensorKind::Humidity);
        for _ in 0..100 {
            let r = gen.next_reading();
            assert!(r.value >= 30.0 && r.value < 70.0);
        }
    }
}
