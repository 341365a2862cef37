// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Row records emitted by the reconciler to the sinks.

use chrono::{DateTime, Utc};
use telemetry_wire::SensorKind;

/// The kind tag recorded on every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Init,
    Data,
    Heartbeat,
}

impl RowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RowKind::Init => "INIT",
            RowKind::Data => "DATA",
            RowKind::Heartbeat => "HEARTBEAT",
        }
    }
}

impl From<telemetry_wire::FrameKind> for RowKind {
    fn from(kind: telemetry_wire::FrameKind) -> Self {
        match kind {
            telemetry_wire::FrameKind::Init => RowKind::Init,
            telemetry_wire::FrameKind::Data => RowKind::Data,
            telemetry_wire::FrameKind::Heartbeat => RowKind::Heartbeat,
        }
    }
}

/// One primary-log row: a real, duplicate-marked, or synthesized
/// reconstruction of a sequence position.
#[derive(Debug, Clone)]
pub struct Row {
    pub wall_clock: DateTime<Utc>,
    pub precise_time: f64,
    pub device_id: u16,
    pub sequence: u32,
    pub kind: RowKind,
    pub duplicate: bool,
    pub gap_synthesized: bool,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub voltage: Option<f32>,
}

impl Row {
    pub fn now(
        device_id: u16,
        sequence: u32,
        kind: RowKind,
        duplicate: bool,
        gap_synthesized: bool,
        temperature: Option<f32>,
        humidity: Option<f32>,
        voltage: Option<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            wall_clock: now,
            precise_time: now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6,
            device_id,
            sequence,
            kind,
            duplicate,
            gap_synthesized,
            temperature,
            humidity,
            voltage,
        }
    }
}

/// One secondary-log row: a single sub-reading of a batch, with that
/// sensor kind's statistics across the whole batch.
#[derive(Debug, Clone)]
pub struct BatchDetailRow {
    pub wall_clock: DateTime<Utc>,
    pub device_id: u16,
    pub sequence: u32,
    pub batch_size: usize,
    pub reading_index: usize,
    pub sensor_kind: SensorKind,
    pub value: f32,
    pub batch_avg: f32,
    pub batch_min: f32,
    pub batch_max: f32,
}
