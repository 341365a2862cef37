// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Linear interpolation across a sequence gap, single- and batch-mode.

use crate::registry::ReadingTriple;
use crate::row::{BatchDetailRow, Row, RowKind};
use chrono::Utc;
use telemetry_wire::SensorKind;

/// Synthesize the rows for the open positions `left_seq+1 ..= right_seq-1`.
///
/// `left` is the last known-good reading triple (or the default triple
/// if no real data has ever been seen for this device, in which case
/// the gap is a constant stretch equal to `right`). `batch_size` is the
/// right endpoint's reading count per sequence (`1` outside batch mode).
pub fn interpolate_gap(
    left_seq: u32,
    left: ReadingTriple,
    right_seq: u32,
    right: ReadingTriple,
    batch_size: usize,
) -> (Vec<Row>, Vec<BatchDetailRow>) {
    let n = right_seq.saturating_sub(left_seq).saturating_sub(1) as usize;
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    let k = batch_size.max(1);

    // A gap that precedes any real data has no left endpoint at all;
    // treat the stretch as constant at the right endpoint's value
    // rather than leaving every component absent.
    let left = if left.temperature.is_none() && left.humidity.is_none() && left.voltage.is_none() {
        right
    } else {
        left
    };

    let mut rows = Vec::with_capacity(n);
    let mut detail_rows = Vec::new();

    for i in 1..=n {
        let seq = left_seq + i as u32;
        let now = Utc::now();

        if k == 1 {
            let row = Row {
                wall_clock: now,
                precise_time: now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6,
                device_id: 0, // filled in by the caller
                sequence: seq,
                kind: RowKind::Data,
                duplicate: false,
                gap_synthesized: true,
                temperature: interpolate_component(left.temperature, right.temperature, n, k, i),
                humidity: interpolate_component(left.humidity, right.humidity, n, k, i),
                voltage: interpolate_component(left.voltage, right.voltage, n, k, i),
            };
            rows.push(row);
            continue;
        }

        // Batch mode: advance k sub-steps per row, each sensor kind's
        // canonical value is the mean of its k sub-steps; every
        // sub-step is also emitted to the secondary detail sink.
        let components = [
            (SensorKind::Temperature, left.temperature, right.temperature),
            (SensorKind::Humidity, left.humidity, right.humidity),
            (SensorKind::Voltage, left.voltage, right.voltage),
        ];

        let mut means = [None, None, None];
        for (slot, (kind, l, r)) in components.into_iter().enumerate() {
            let (l, r) = match (l, r) {
                (Some(l), Some(r)) => (l, r),
                _ => continue,
            };
            let step = (r - l) / (n * k + 1) as f32;
            let mut sub_values = Vec::with_capacity(k);
            for sub in 1..=k {
                let global_step = (i - 1) * k + sub;
                sub_values.push(l + step * global_step as f32);
            }
            let sum: f32 = sub_values.iter().sum();
            let mean = sum / k as f32;
            means[slot] = Some(mean);

            let batch_min = sub_values.iter().cloned().fold(f32::INFINITY, f32::min);
            let batch_max = sub_values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            for (reading_index, value) in sub_values.iter().enumerate() {
                detail_rows.push(BatchDetailRow {
                    wall_clock: now,
                    device_id: 0,
                    sequence: seq,
                    batch_size: k,
                    reading_index,
                    sensor_kind: kind,
                    value: *value,
                    batch_avg: mean,
                    batch_min,
                    batch_max,
                });
            }
        }

        rows.push(Row {
            wall_clock: now,
            precise_time: now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6,
            device_id: 0,
            sequence: seq,
            kind: RowKind::Data,
            duplicate: false,
            gap_synthesized: true,
            temperature: means[0],
            humidity: means[1],
            voltage: means[2],
        });
    }

    (rows, detail_rows)
}

/// Per-component step `(right - left) / (n*k + 1)`, applied once for
/// row `i` in non-batch mode (`k == 1`). Absent if either endpoint
/// lacks the component.
fn interpolate_component(
    left: Option<f32>,
    right: Option<f32>,
    n: usize,
    k: usize,
    i: usize,
) -> Option<f32> {
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => return None,
    };
    let step = (right - left) / (n * k + 1) as f32;
    Some(left + step * i as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(t: Option<f32>, h: Option<f32>, v: Option<f32>) -> ReadingTriple {
        ReadingTriple {
            temperature: t,
            humidity: h,
            voltage: v,
        }
    }

    #[test]
    fn single_gap_interpolates_midpoint() {
        // L=4 (21.5), R=6 (22.5) -> seq 5 should be 22.0.
        let left = triple(Some(21.5), None, None);
        let right = triple(Some(22.5), None, None);
        let (rows, details) = interpolate_gap(4, left, 6, right, 1);
        assert_eq!(rows.len(), 1);
        assert!(details.is_empty());
        assert_eq!(rows[0].sequence, 5);
        assert!((rows[0].temperature.unwrap() - 22.0).abs() < 1e-4);
        assert!(rows[0].gap_synthesized);
    }

    #[test]
    fn missing_component_stays_absent() {
        let left = triple(Some(20.0), None, Some(3.0));
        let right = triple(Some(24.0), Some(50.0), Some(3.5));
        let (rows, _) = interpolate_gap(0, left, 2, right, 1);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].humidity.is_none());
        assert!(rows[0].temperature.is_some());
        assert!(rows[0].voltage.is_some());
    }

    #[test]
    fn absent_left_endpoint_is_treated_as_constant_at_right() {
        // Gap precedes any real data: last_known_values is the default
        // triple. The synthesized stretch should equal the right
        // endpoint's value throughout, not leave every row absent.
        let left = ReadingTriple::default();
        let right = triple(Some(24.0), None, Some(3.3));
        let (rows, _) = interpolate_gap(0, left, 3, right, 1);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!((row.temperature.unwrap() - 24.0).abs() < 1e-4);
            assert!(row.humidity.is_none());
            assert!((row.voltage.unwrap() - 3.3).abs() < 1e-4);
        }
    }

    #[test]
    fn no_gap_produces_no_rows() {
        let triple_a = triple(Some(1.0), None, None);
        let (rows, details) = interpolate_gap(4, triple_a, 5, triple_a, 1);
        assert!(rows.is_empty());
        assert!(details.is_empty());
    }

    #[test]
    fn batch_mode_row_is_mean_of_substeps_and_emits_detail_rows() {
        // L=0 -> R=2, one missing seq=1, batch size k=4.
        let left = triple(Some(20.0), None, None);
        let right = triple(Some(28.0), None, None);
        let (rows, details) = interpolate_gap(0, left, 2, right, 4);
        assert_eq!(rows.len(), 1);
        // n=1, k=4: denominator n*k+1=5, step=(28-20)/5=1.6
        // sub-steps: 20+1.6*1..4 = 21.6, 23.2, 24.8, 26.4; mean = 24.0
        assert!((rows[0].temperature.unwrap() - 24.0).abs() < 1e-3);
        assert_eq!(details.len(), 4);
        assert_eq!(details[0].batch_size, 4);
        assert!((details[0].batch_avg - 24.0).abs() < 1e-3);
    }
}
