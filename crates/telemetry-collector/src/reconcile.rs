// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The gap reconciler: the central per-device state machine.
//!
//! Classifies each arriving DATA/HEARTBEAT frame as first-ever,
//! duplicate, in-order, or future; drains the reorder buffer while
//! contiguous; and, when a gap stalls, invokes the interpolator to
//! synthesize the missing rows before processing the frame that
//! closed the gap.

use crate::interpolate::interpolate_gap;
use crate::registry::{DeviceState, ReadingTriple};
use crate::row::{BatchDetailRow, Row, RowKind};
use std::time::{Duration, Instant};
use telemetry_wire::{Frame, FrameKind, SensorKind, SensorReading};

/// Rows produced by one reconciliation step, in emission order.
#[derive(Default)]
pub struct ReconcileOutcome {
    pub rows: Vec<Row>,
    pub batch_detail_rows: Vec<BatchDetailRow>,
    pub duplicates: u64,
    pub missing_positions: u64,
}

impl ReconcileOutcome {
    fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }
}

/// Per-sensor-kind mean/min/max over a set of readings of that kind,
/// plus the full per-reading detail rows (only meaningful for
/// batched frames; see §4.6).
fn summarize_readings(
    readings: &[SensorReading],
    device_id: u16,
    sequence: u32,
    batched: bool,
) -> (ReadingTriple, Vec<BatchDetailRow>) {
    let now = chrono::Utc::now();
    let mut triple = ReadingTriple::default();
    let mut detail_rows = Vec::new();

    for kind in [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Voltage,
    ] {
        let values: Vec<f32> = readings
            .iter()
            .filter(|r| r.sensor_kind == kind)
            .map(|r| r.value)
            .collect();
        if values.is_empty() {
            continue;
        }
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        match kind {
            SensorKind::Temperature => triple.temperature = Some(mean),
            SensorKind::Humidity => triple.humidity = Some(mean),
            SensorKind::Voltage => triple.voltage = Some(mean),
        }

        if batched {
            for (reading_index, value) in values.iter().enumerate() {
                detail_rows.push(BatchDetailRow {
                    wall_clock: now,
                    device_id,
                    sequence,
                    batch_size: values.len(),
                    reading_index,
                    sensor_kind: kind,
                    value: *value,
                    batch_avg: mean,
                    batch_min: min,
                    batch_max: max,
                });
            }
        }
    }

    (triple, detail_rows)
}

/// Handle an INIT frame: reset `last_known_values`, set `L` to the
/// INIT's sequence (even backward — see design notes), then drain.
pub fn on_init(state: &mut DeviceState, device_id: u16, frame: &Frame) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    state.last_known_values = ReadingTriple::default();
    state.last_emitted_sequence = Some(frame.sequence);
    state.gap_opened_at = None;

    outcome.push_row(Row::now(
        device_id,
        frame.sequence,
        RowKind::Init,
        false,
        false,
        None,
        None,
        None,
    ));

    drain_buffer(state, device_id, &mut outcome);
    outcome
}

/// Handle a DATA or HEARTBEAT frame, including the future-arrival
/// timeout trigger (trigger case 1 in §4.4).
pub fn on_frame(
    state: &mut DeviceState,
    device_id: u16,
    frame: Frame,
    arrival: Instant,
    now: Instant,
    max_gap_wait: Duration,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    let seq = frame.sequence;

    match state.last_emitted_sequence {
        None => {
            // First-ever: treat as in-order starting at `s`.
            emit_in_order(state, device_id, &frame, &mut outcome);
            drain_buffer(state, device_id, &mut outcome);
        }
        Some(last) if seq <= last => {
            // Duplicate.
            outcome.duplicates += 1;
            state.counters.duplicates += 1;
            outcome.push_row(duplicate_row(device_id, &frame));
        }
        Some(last) if seq == last + 1 => {
            emit_in_order(state, device_id, &frame, &mut outcome);
            state.gap_opened_at = None;
            drain_buffer(state, device_id, &mut outcome);
        }
        Some(last) => {
            // Future. Trigger 1: check for an already-stalled gap
            // before buffering this frame.
            let stalled = state
                .gap_opened_at
                .is_some_and(|opened| now.duration_since(opened) > max_gap_wait);

            if stalled {
                close_gap(state, device_id, now, &mut outcome);
                // After closing, re-evaluate this frame against the
                // now-updated `last_emitted_sequence`.
                let updated_last = state.last_emitted_sequence.unwrap_or(last);
                if seq <= updated_last {
                    outcome.duplicates += 1;
                    state.counters.duplicates += 1;
                    outcome.push_row(duplicate_row(device_id, &frame));
                } else if seq == updated_last + 1 {
                    emit_in_order(state, device_id, &frame, &mut outcome);
                    state.gap_opened_at = None;
                    drain_buffer(state, device_id, &mut outcome);
                } else {
                    buffer_future_frame(state, seq, frame, arrival);
                }
            } else {
                buffer_future_frame(state, seq, frame, arrival);
            }
        }
    }

    outcome
}

fn buffer_future_frame(state: &mut DeviceState, seq: u32, frame: Frame, arrival: Instant) {
    state.buffer.insert(seq, frame, arrival);
    if state.gap_opened_at.is_none() {
        state.gap_opened_at = Some(arrival);
    }
}

fn duplicate_row(device_id: u16, frame: &Frame) -> Row {
    let (triple, _) = summarize_readings(&frame.readings, device_id, frame.sequence, false);
    Row::now(
        device_id,
        frame.sequence,
        RowKind::from(frame.kind),
        true,
        false,
        triple.temperature,
        triple.humidity,
        triple.voltage,
    )
}

/// Emit the in-order row for `frame`, advance `L`, and (for DATA
/// frames only) refresh `last_known_values`.
fn emit_in_order(
    state: &mut DeviceState,
    device_id: u16,
    frame: &Frame,
    outcome: &mut ReconcileOutcome,
) {
    state.counters.received += 1;
    state.last_emitted_sequence = Some(frame.sequence);

    let row = match frame.kind {
        FrameKind::Heartbeat => Row::now(
            device_id,
            frame.sequence,
            RowKind::Heartbeat,
            false,
            false,
            None,
            None,
            None,
        ),
        FrameKind::Data => {
            let (triple, details) =
                summarize_readings(&frame.readings, device_id, frame.sequence, frame.batched);
            state.last_known_values = triple;
            outcome.batch_detail_rows.extend(details);
            Row::now(
                device_id,
                frame.sequence,
                RowKind::Data,
                false,
                false,
                triple.temperature,
                triple.humidity,
                triple.voltage,
            )
        }
        FrameKind::Init => unreachable!("INIT handled by on_init"),
    };
    outcome.push_row(row);
}

/// After any event that advances `L`, repeatedly pop the buffer's
/// minimum entry while it equals `L + 1`.
fn drain_buffer(state: &mut DeviceState, device_id: u16, outcome: &mut ReconcileOutcome) {
    loop {
        let next_expected = match state.last_emitted_sequence {
            Some(l) => l + 1,
            None => break,
        };
        let is_next = matches!(state.buffer.peek_min(), Some((&seq, _)) if seq == next_expected);
        if !is_next {
            break;
        }
        let (_, buffered) = state.buffer.pop_min().expect("peeked above");
        emit_in_order(state, device_id, &buffered.frame, outcome);
    }
}

/// Close a stalled gap: select the right endpoint (buffer minimum, or
/// — from the maintenance sweep — force-close with the buffer
/// minimum regardless of the `T_gap` check), interpolate the missing
/// rows, then process the right endpoint itself.
fn close_gap(state: &mut DeviceState, device_id: u16, _now: Instant, outcome: &mut ReconcileOutcome) {
    let left = state.last_emitted_sequence.unwrap_or(0);
    let Some((&right_seq, _)) = state.buffer.peek_min() else {
        return;
    };

    let batch_size = state
        .buffer
        .peek_min()
        .map(|(_, b)| if b.frame.batched { b.frame.readings.len().max(1) } else { 1 })
        .unwrap_or(1);

    let gap_width = right_seq.saturating_sub(left).saturating_sub(1);
    if gap_width > 0 {
        let right_triple = state
            .buffer
            .peek_min()
            .map(|(_, b)| summarize_readings(&b.frame.readings, device_id, right_seq, false).0)
            .unwrap_or_default();
        let left_triple = state.last_known_values;

        let (rows, details) =
            interpolate_gap(left, left_triple, right_seq, right_triple, batch_size);
        outcome.missing_positions += gap_width as u64;
        state.counters.missing_positions += gap_width as u64;
        for mut row in rows {
            row.device_id = device_id;
            outcome.push_row(row);
        }
        for mut detail in details {
            detail.device_id = device_id;
            outcome.batch_detail_rows.push(detail);
        }
    }

    state.last_emitted_sequence = Some(right_seq - 1);
    state.gap_opened_at = None;

    // Process the right endpoint itself: pop it from the buffer and
    // apply the in-order rule, then continue draining.
    if let Some((_, buffered)) = state.buffer.pop_min() {
        emit_in_order(state, device_id, &buffered.frame, outcome);
        drain_buffer(state, device_id, outcome);
    }
}

/// Periodic maintenance sweep (trigger case 2): force-close a gap
/// when either `T_gap` has elapsed since it opened, or the oldest
/// buffered entry is older than `2 * T_gap` (the detail floor).
pub fn maintenance_sweep(
    state: &mut DeviceState,
    device_id: u16,
    now: Instant,
    max_gap_wait: Duration,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    let stalled_by_timer = state
        .gap_opened_at
        .is_some_and(|opened| now.duration_since(opened) > max_gap_wait);
    let stalled_by_floor = state
        .buffer
        .oldest_arrival()
        .is_some_and(|oldest| now.duration_since(oldest) > max_gap_wait * 2);

    if (stalled_by_timer || stalled_by_floor) && !state.buffer.is_empty() {
        close_gap(state, device_id, now, &mut outcome);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DeviceRegistry;
    use telemetry_wire::{Frame, SensorKind, SensorReading};

    fn data(seq: u32, temp: f32) -> Frame {
        Frame::data(
            3001,
            seq,
            0,
            vec![SensorReading::new(SensorKind::Temperature, temp)],
            false,
        )
    }

    #[test]
    fn first_ever_frame_is_in_order() {
        let mut registry = DeviceRegistry::new(16);
        let state = registry.get_or_create(3001);
        let outcome = on_frame(
            state,
            3001,
            data(1, 20.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(state.last_emitted_sequence, Some(1));
        assert_eq!(state.last_known_values.temperature, Some(20.0));
    }

    #[test]
    fn duplicate_does_not_mutate_last_sequence() {
        let mut registry = DeviceRegistry::new(16);
        let state = registry.get_or_create(3001);
        on_frame(
            state,
            3001,
            data(1, 20.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        let outcome = on_frame(
            state,
            3001,
            data(1, 99.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        assert_eq!(outcome.duplicates, 1);
        assert!(outcome.rows[0].duplicate);
        assert_eq!(state.last_emitted_sequence, Some(1));
        assert_eq!(state.last_known_values.temperature, Some(20.0));
    }

    #[test]
    fn future_frame_is_buffered_and_opens_gap() {
        let mut registry = DeviceRegistry::new(16);
        let state = registry.get_or_create(3001);
        on_frame(
            state,
            3001,
            data(1, 20.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        let outcome = on_frame(
            state,
            3001,
            data(3, 22.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        assert!(outcome.rows.is_empty());
        assert_eq!(state.buffer.len(), 1);
        assert!(state.gap_opened_at.is_some());
    }

    #[test]
    fn out_of_order_within_window_drains_in_sequence() {
        let mut registry = DeviceRegistry::new(16);
        let state = registry.get_or_create(3001);
        on_frame(
            state,
            3001,
            data(1, 1.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        on_frame(
            state,
            3001,
            data(3, 3.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        on_frame(
            state,
            3001,
            data(4, 4.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        let outcome = on_frame(
            state,
            3001,
            data(2, 2.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        let seqs: Vec<u32> = outcome.rows.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert!(outcome.rows.iter().all(|r| !r.gap_synthesized));
        assert_eq!(state.last_emitted_sequence, Some(4));
    }

    #[test]
    fn stalled_gap_force_closes_via_maintenance_sweep() {
        let mut registry = DeviceRegistry::new(16);
        let state = registry.get_or_create(3001);
        let t0 = Instant::now();
        on_frame(state, 3001, data(4, 21.5), t0, t0, Duration::from_secs(5));
        on_frame(state, 3001, data(6, 22.5), t0, t0, Duration::from_secs(5));

        let later = t0 + Duration::from_secs(6);
        let outcome = maintenance_sweep(state, 3001, later, Duration::from_secs(5));
        assert_eq!(outcome.missing_positions, 1);
        let synthesized: Vec<_> = outcome
            .rows
            .iter()
            .filter(|r| r.gap_synthesized)
            .collect();
        assert_eq!(synthesized.len(), 1);
        assert_eq!(synthesized[0].sequence, 5);
        assert!((synthesized[0].temperature.unwrap() - 22.0).abs() < 1e-3);
        assert_eq!(state.last_emitted_sequence, Some(6));
    }

    #[test]
    fn init_moves_last_sequence_backward_when_instructed() {
        let mut registry = DeviceRegistry::new(16);
        let state = registry.get_or_create(3001);
        on_frame(
            state,
            3001,
            data(10, 1.0),
            Instant::now(),
            Instant::now(),
            Duration::from_secs(5),
        );
        assert_eq!(state.last_emitted_sequence, Some(10));

        let init = Frame::init(3001, 2, 0);
        on_init(state, 3001, &init);
        assert_eq!(state.last_emitted_sequence, Some(2));
        assert_eq!(state.last_known_values, ReadingTriple::default());
    }
}
