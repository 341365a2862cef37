// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for frame encoding and decoding.

use thiserror::Error;

/// Everything that can go wrong turning a [`crate::Frame`] into bytes
/// or bytes back into a [`crate::Frame`].
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("unsupported protocol version {found} (expected {expected})")]
    InvalidVersion { found: u8, expected: u8 },

    #[error("unknown frame kind byte {0:#04x}")]
    UnknownKind(u8),

    #[error("device id {0} is not in the configured accept-set")]
    UnauthorizedDevice(u16),

    #[error("{kind:?} frames must not carry readings, found {reading_count}")]
    BadPayloadForKind {
        kind: crate::FrameKind,
        reading_count: usize,
    },

    #[error("encoded payload of {size} bytes exceeds the {limit}-byte limit")]
    PayloadOverflow { size: usize, limit: usize },

    #[error("unknown sensor kind byte {0:#04x}")]
    BadSensorKind(u8),

    #[error("reading value is not finite: {0}")]
    NonFiniteValue(f32),

    #[error("trailing {0} byte(s) after the expected payload")]
    TrailingBytes(usize),

    #[error("DATA frame declared {declared} reading(s) but only {available} byte(s) remain")]
    TruncatedPayload { declared: usize, available: usize },

    #[error("write overflow at offset {offset}: needed {needed} byte(s), capacity {capacity}")]
    WriteOverflow {
        offset: usize,
        needed: usize,
        capacity: usize,
    },

    #[error("read overflow at offset {offset}: needed {needed} byte(s), {available} available")]
    ReadOverflow {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("datagram of {0} byte(s) is shorter than the 13-byte header")]
    HeaderTooShort(usize),
}
