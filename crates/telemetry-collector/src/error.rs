// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fatal error taxonomy for the collector pipeline.
//!
//! Decode failures and unauthorized devices are not represented here:
//! per the error handling design, those are logged and dropped inline
//! by the ingress loop rather than propagated.

use thiserror::Error;

/// Errors that terminate the collector process.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to bind UDP socket on port {port}: {source}")]
    SocketBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("socket I/O error: {0}")]
    SocketIo(#[source] std::io::Error),

    #[error("failed to open sink file {path}: {source}")]
    SinkOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sink write failed: {0}")]
    SinkWrite(#[source] std::io::Error),
}
