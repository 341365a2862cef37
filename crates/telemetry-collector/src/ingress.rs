// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The UDP ingress loop: receives datagrams, decodes them, drives the
//! reconciler, and periodically sweeps for stalled gaps.

use crate::config::CollectorConfig;
use crate::error::PipelineError;
use crate::metrics::MetricsAccumulator;
use crate::reconcile::{self, ReconcileOutcome};
use crate::registry::DeviceRegistry;
use crate::sink::{BatchDetailSink, RowSink};
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry_wire::{Frame, FrameKind, PAYLOAD_LIMIT};

/// Maintenance sweep cadence by datagram count, matching the reference
/// collector's `packet_count % 100 == 0` cleanup check (in addition to
/// the per-idle-tick sweep below).
const SWEEP_EVERY_N_DATAGRAMS: u64 = 100;

/// A clonable stop flag, set by the Ctrl-C handler and polled once
/// per receive-timeout cycle.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain a [`ReconcileOutcome`] into the sinks and metrics, in row
/// emission order.
fn drain_outcome(
    outcome: ReconcileOutcome,
    row_sink: &mut RowSink,
    batch_sink: &mut BatchDetailSink,
    metrics: &mut MetricsAccumulator,
) -> Result<(), PipelineError> {
    metrics.duplicates += outcome.duplicates;
    metrics.record_missing(outcome.missing_positions);
    for row in &outcome.rows {
        row_sink.record(row)?;
    }
    for detail in &outcome.batch_detail_rows {
        batch_sink.record(detail)?;
    }
    Ok(())
}

/// Run the ingress loop until `stop` is set or, if configured, the
/// device population has been idle past `auto_shutdown`.
pub fn run(
    socket: &UdpSocket,
    config: &CollectorConfig,
    registry: &mut DeviceRegistry,
    row_sink: &mut RowSink,
    batch_sink: &mut BatchDetailSink,
    metrics: &mut MetricsAccumulator,
    stop: &StopHandle,
) -> Result<(), PipelineError> {
    socket
        .set_read_timeout(Some(Duration::from_secs(1)))
        .map_err(PipelineError::SocketIo)?;

    let mut buf = vec![0u8; PAYLOAD_LIMIT];
    let mut last_activity = Instant::now();
    let mut datagrams_since_sweep: u64 = 0;

    while !stop.is_stopped() {
        match socket.recv_from(&mut buf) {
            Ok((len, _addr)) => {
                let start = Instant::now();
                last_activity = start;
                handle_datagram(
                    &buf[..len],
                    config,
                    registry,
                    row_sink,
                    batch_sink,
                    metrics,
                )?;
                metrics.record_packet(len, start.elapsed());

                datagrams_since_sweep += 1;
                if datagrams_since_sweep >= SWEEP_EVERY_N_DATAGRAMS {
                    datagrams_since_sweep = 0;
                    sweep_all(config, registry, row_sink, batch_sink, metrics)?;
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                sweep_all(config, registry, row_sink, batch_sink, metrics)?;
            }
            Err(e) => return Err(PipelineError::SocketIo(e)),
        }

        if let Some(idle_threshold) = config.auto_shutdown {
            if last_activity.elapsed() > idle_threshold {
                tracing::info!(
                    idle_secs = last_activity.elapsed().as_secs(),
                    "auto-shutdown threshold reached"
                );
                break;
            }
        }
    }

    Ok(())
}

fn handle_datagram(
    bytes: &[u8],
    config: &CollectorConfig,
    registry: &mut DeviceRegistry,
    row_sink: &mut RowSink,
    batch_sink: &mut BatchDetailSink,
    metrics: &mut MetricsAccumulator,
) -> Result<(), PipelineError> {
    let frame = match Frame::decode(bytes, &config.accepted_device_ids) {
        Ok(frame) => frame,
        Err(e) => {
            metrics.record_decode_failure();
            tracing::warn!(error = %e, "dropping undecodable datagram");
            return Ok(());
        }
    };

    let device_id = frame.device_id;
    registry.get_or_create(device_id).counters.bytes += bytes.len() as u64;
    let now = Instant::now();
    let arrival = now;

    let outcome = match frame.kind {
        FrameKind::Init => {
            let state = registry.get_or_create(device_id);
            reconcile::on_init(state, device_id, &frame)
        }
        FrameKind::Data | FrameKind::Heartbeat => {
            let state = registry.get_or_create(device_id);
            reconcile::on_frame(state, device_id, frame, arrival, now, config.max_gap_wait)
        }
    };

    metrics.buffer_evictions = registry
        .iter()
        .map(|(_, state)| state.buffer.evictions)
        .sum();
    drain_outcome(outcome, row_sink, batch_sink, metrics)
}

fn sweep_all(
    config: &CollectorConfig,
    registry: &mut DeviceRegistry,
    row_sink: &mut RowSink,
    batch_sink: &mut BatchDetailSink,
    metrics: &mut MetricsAccumulator,
) -> Result<(), PipelineError> {
    let now = Instant::now();
    let device_ids: Vec<u16> = registry.iter().map(|(&id, _)| id).collect();
    for device_id in device_ids {
        let state = registry.get_or_create(device_id);
        let outcome = reconcile::maintenance_sweep(state, device_id, now, config.max_gap_wait);
        if !outcome.rows.is_empty() {
            tracing::debug!(device_id, count = outcome.rows.len(), "sweep force-closed a stalled gap");
        }
        drain_outcome(outcome, row_sink, batch_sink, metrics)?;
    }
    Ok(())
}
