// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire codec for the UDP telemetry protocol.
//!
//! A datagram is a 13-byte header, big-endian throughout, followed by
//! a DATA payload for [`FrameKind::Data`] frames:
//!
//! ```text
//! offset  size  field
//! 0       1     version (0x01)
//! 1       1     kind (0x00 INIT, 0x01 DATA, 0x02 HEARTBEAT)
//! 2       2     device_id
//! 4       4     sequence
//! 8       1     flags (bit 0 = batched)
//! 9       4     timestamp
//! 13      1     reading_count           (DATA only)
//! 14..    5*n   (sensor_kind, f32) * n  (DATA only)
//! ```
//!
//! The codec is the single source of truth for wire validity: once a
//! frame decodes, every invariant below holds and callers never need
//! to recheck it.

mod cursor;
mod error;

pub use error::CodecError;

use cursor::{Cursor, CursorMut};
use std::collections::HashSet;

pub const VERSION: u8 = 0x01;
pub const HEADER_SIZE: usize = 13;
pub const READING_SIZE: usize = 5;
pub const PAYLOAD_LIMIT: usize = 200;
pub const MAX_READINGS_PER_PACKET: usize = (PAYLOAD_LIMIT - HEADER_SIZE - 1) / READING_SIZE;
const FLAG_BATCHING: u8 = 0x01;

/// The three message shapes this protocol carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Init,
    Data,
    Heartbeat,
}

impl FrameKind {
    fn to_byte(self) -> u8 {
        match self {
            FrameKind::Init => 0x00,
            FrameKind::Data => 0x01,
            FrameKind::Heartbeat => 0x02,
        }
    }

    fn from_byte(b: u8) -> Result<Self, CodecError> {
        match b {
            0x00 => Ok(FrameKind::Init),
            0x01 => Ok(FrameKind::Data),
            0x02 => Ok(FrameKind::Heartbeat),
            other => Err(CodecError::UnknownKind(other)),
        }
    }
}

/// One of the three sensor kinds a reading can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Temperature,
    Humidity,
    Voltage,
}

impl SensorKind {
    fn to_byte(self) -> u8 {
        match self {
            SensorKind::Temperature => 0x01,
            SensorKind::Humidity => 0x02,
            SensorKind::Voltage => 0x03,
        }
    }

    fn from_byte(b: u8) -> Result<Self, CodecError> {
        match b {
            0x01 => Ok(SensorKind::Temperature),
            0x02 => Ok(SensorKind::Humidity),
            0x03 => Ok(SensorKind::Voltage),
            other => Err(CodecError::BadSensorKind(other)),
        }
    }
}

/// A single `(sensor_kind, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub sensor_kind: SensorKind,
    pub value: f32,
}

impl SensorReading {
    pub fn new(sensor_kind: SensorKind, value: f32) -> Self {
        Self { sensor_kind, value }
    }
}

/// The decoded form of a datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub version: u8,
    pub kind: FrameKind,
    pub device_id: u16,
    pub sequence: u32,
    pub batched: bool,
    pub timestamp: u32,
    pub readings: Vec<SensorReading>,
}

impl Frame {
    /// Build an INIT frame.
    pub fn init(device_id: u16, sequence: u32, timestamp: u32) -> Self {
        Self {
            version: VERSION,
            kind: FrameKind::Init,
            device_id,
            sequence,
            batched: false,
            timestamp,
            readings: Vec::new(),
        }
    }

    /// Build a HEARTBEAT frame.
    pub fn heartbeat(device_id: u16, sequence: u32, timestamp: u32) -> Self {
        Self {
            version: VERSION,
            kind: FrameKind::Heartbeat,
            device_id,
            sequence,
            batched: false,
            timestamp,
            readings: Vec::new(),
        }
    }

    /// Build a DATA frame carrying one or more readings.
    pub fn data(
        device_id: u16,
        sequence: u32,
        timestamp: u32,
        readings: Vec<SensorReading>,
        batched: bool,
    ) -> Self {
        Self {
            version: VERSION,
            kind: FrameKind::Data,
            device_id,
            sequence,
            batched,
            timestamp,
            readings,
        }
    }

    fn validate_shape(&self) -> Result<(), CodecError> {
        if self.version != VERSION {
            return Err(CodecError::InvalidVersion {
                found: self.version,
                expected: VERSION,
            });
        }

        match self.kind {
            FrameKind::Init | FrameKind::Heartbeat => {
                if !self.readings.is_empty() {
                    return Err(CodecError::BadPayloadForKind {
                        kind: self.kind,
                        reading_count: self.readings.len(),
                    });
                }
            }
            FrameKind::Data => {
                if self.readings.is_empty() {
                    return Err(CodecError::BadPayloadForKind {
                        kind: self.kind,
                        reading_count: 0,
                    });
                }
            }
        }

        for reading in &self.readings {
            if !reading.value.is_finite() {
                return Err(CodecError::NonFiniteValue(reading.value));
            }
        }

        let payload_size = HEADER_SIZE + 1 + self.readings.len() * READING_SIZE;
        if matches!(self.kind, FrameKind::Data) && payload_size > PAYLOAD_LIMIT {
            return Err(CodecError::PayloadOverflow {
                size: payload_size,
                limit: PAYLOAD_LIMIT,
            });
        }

        Ok(())
    }

    /// Encode this frame, checking the device id against `accepted`.
    pub fn encode(&self, accepted: &HashSet<u16>) -> Result<Vec<u8>, CodecError> {
        if !accepted.contains(&self.device_id) {
            return Err(CodecError::UnauthorizedDevice(self.device_id));
        }
        self.validate_shape()?;

        let size = match self.kind {
            FrameKind::Init | FrameKind::Heartbeat => HEADER_SIZE,
            FrameKind::Data => HEADER_SIZE + 1 + self.readings.len() * READING_SIZE,
        };
        let mut buf = vec![0u8; size];
        {
            let mut w = CursorMut::new(&mut buf);
            w.write_u8(self.version)?;
            w.write_u8(self.kind.to_byte())?;
            w.write_u16_be(self.device_id)?;
            w.write_u32_be(self.sequence)?;
            w.write_u8(if self.batched { FLAG_BATCHING } else { 0 })?;
            w.write_u32_be(self.timestamp)?;

            if matches!(self.kind, FrameKind::Data) {
                w.write_u8(self.readings.len() as u8)?;
                for reading in &self.readings {
                    w.write_u8(reading.sensor_kind.to_byte())?;
                    w.write_f32_be(reading.value)?;
                }
            }
        }
        Ok(buf)
    }

    /// Decode a datagram, checking the device id against `accepted`.
    pub fn decode(buf: &[u8], accepted: &HashSet<u16>) -> Result<Self, CodecError> {
        if buf.len() < HEADER_SIZE {
            return Err(CodecError::HeaderTooShort(buf.len()));
        }

        let mut r = Cursor::new(buf);
        let version = r.read_u8()?;
        let kind = FrameKind::from_byte(r.read_u8()?)?;
        let device_id = r.read_u16_be()?;
        let sequence = r.read_u32_be()?;
        let flags = r.read_u8()?;
        let timestamp = r.read_u32_be()?;
        let batched = flags & FLAG_BATCHING != 0;

        if !accepted.contains(&device_id) {
            return Err(CodecError::UnauthorizedDevice(device_id));
        }

        let readings = match kind {
            FrameKind::Init | FrameKind::Heartbeat => {
                if !r.is_eof() {
                    return Err(CodecError::TrailingBytes(r.remaining()));
                }
                Vec::new()
            }
            FrameKind::Data => {
                if r.is_eof() {
                    return Err(CodecError::BadPayloadForKind {
                        kind: FrameKind::Data,
                        reading_count: 0,
                    });
                }
                let reading_count = r.read_u8()? as usize;
                if reading_count == 0 {
                    return Err(CodecError::BadPayloadForKind {
                        kind: FrameKind::Data,
                        reading_count: 0,
                    });
                }
                let expected_bytes = reading_count * READING_SIZE;
                if r.remaining() < expected_bytes {
                    return Err(CodecError::TruncatedPayload {
                        declared: reading_count,
                        available: r.remaining(),
                    });
                }

                let mut readings = Vec::with_capacity(reading_count);
                for _ in 0..reading_count {
                    let sensor_kind = SensorKind::from_byte(r.read_u8()?)?;
                    let value = r.read_f32_be()?;
                    if !value.is_finite() {
                        return Err(CodecError::NonFiniteValue(value));
                    }
                    readings.push(SensorReading::new(sensor_kind, value));
                }

                if !r.is_eof() {
                    return Err(CodecError::TrailingBytes(r.remaining()));
                }
                readings
            }
        };

        let frame = Frame {
            version,
            kind,
            device_id,
            sequence,
            batched,
            timestamp,
            readings,
        };
        frame.validate_shape()?;
        Ok(frame)
    }
}

/// Merge several single-reading DATA frames from the same device into
/// one batched DATA frame, mirroring the behavior of a sensor emitter
/// flushing its batch buffer.
pub fn batch_frames(frames: &[Frame]) -> Option<Frame> {
    let first = frames.first()?;
    if frames
        .iter()
        .any(|f| !matches!(f.kind, FrameKind::Data) || f.device_id != first.device_id)
    {
        return None;
    }

    let sequence = frames.iter().map(|f| f.sequence).max()?;
    let timestamp = frames.iter().map(|f| f.timestamp).max()?;
    let readings: Vec<SensorReading> = frames.iter().flat_map(|f| f.readings.clone()).collect();

    Some(Frame::data(
        first.device_id,
        sequence,
        timestamp,
        readings,
        true,
    ))
}
