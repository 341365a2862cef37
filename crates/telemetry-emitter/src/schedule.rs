// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The send scheduler: INIT once, then a priority-ordered loop of
//! DATA/BATCH sends and idle heartbeats, mirroring the reference
//! sensor client's two run modes.

use crate::config::EmitterConfig;
use crate::generate::ReadingGenerator;
use std::collections::HashSet;
use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};
use telemetry_wire::Frame;

/// A clonable stop flag, set by the Ctrl-C handler.
#[derive(Clone)]
pub struct StopHandle {
    flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self {
            flag: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// One simulated device's send session: owns the sequence counter,
/// the batch buffer, and the socket.
pub struct EmitterSession {
    socket: UdpSocket,
    server_addr: String,
    device_id: u16,
    accepted: HashSet<u16>,
    seq: u32,
    generator: ReadingGenerator,
    batch: Vec<telemetry_wire::SensorReading>,
}

impl EmitterSession {
    pub fn new(config: &EmitterConfig) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            server_addr: config.server_addr.clone(),
            device_id: config.device_id,
            accepted: [config.device_id].into_iter().collect(),
            seq: 0,
            generator: ReadingGenerator::new(config.seed, config.sensor_kind),
            batch: Vec::new(),
        })
    }

    fn send(&mut self, frame: Frame) -> std::io::Result<()> {
        let bytes = frame
            .encode(&self.accepted)
            .expect("frames built by this session always encode");
        self.socket.send_to(&bytes, &self.server_addr)?;
        self.seq += 1;
        Ok(())
    }

    fn now_unix(&self) -> u32 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }

    pub fn send_init(&mut self) -> std::io::Result<()> {
        let frame = Frame::init(self.device_id, self.seq, self.now_unix());
        tracing::info!(device_id = self.device_id, seq = frame.sequence, "INIT");
        self.send(frame)
    }

    pub fn send_heartbeat(&mut self) -> std::io::Result<()> {
        let frame = Frame::heartbeat(self.device_id, self.seq, self.now_unix());
        tracing::info!(device_id = self.device_id, seq = frame.sequence, "HEARTBEAT");
        self.send(frame)
    }

    pub fn send_data(&mut self) -> std::io::Result<()> {
        let reading = self.generator.next_reading();
        let frame = Frame::data(
            self.device_id,
            self.seq,
            self.now_unix(),
            vec![reading],
            false,
        );
        tracing::info!(
            device_id = self.device_id,
            seq = frame.sequence,
            value = reading.value,
            "DATA"
        );
        self.send(frame)
    }

    pub fn add_to_batch(&mut self, max_readings_per_packet: usize) -> std::io::Result<()> {
        let reading = self.generator.next_reading();
        self.batch.push(reading);
        tracing::info!(
            device_id = self.device_id,
            batch_size = self.batch.len(),
            value = reading.value,
            "added reading to batch"
        );
        if self.batch.len() >= max_readings_per_packet {
            tracing::info!(device_id = self.device_id, "batch full, sending early");
            self.send_batch()?;
        }
        Ok(())
    }

    pub fn send_batch(&mut self) -> std::io::Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let readings = std::mem::take(&mut self.batch);
        let avg = readings.iter().map(|r| r.value).sum::<f32>() / readings.len() as f32;
        let min = readings.iter().map(|r| r.value).fold(f32::INFINITY, f32::min);
        let max = readings
            .iter()
            .map(|r| r.value)
            .fold(f32::NEG_INFINITY, f32::max);
        let count = readings.len();
        let frame = Frame::data(self.device_id, self.seq, self.now_unix(), readings, true);
        tracing::info!(
            device_id = self.device_id,
            seq = frame.sequence,
            count,
            avg,
            min,
            max,
            "BATCH"
        );
        self.send(frame)
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_READINGS_PER_PACKET: usize = telemetry_wire::MAX_READINGS_PER_PACKET;

/// Run the priority-ordered send loop for `config.duration`, honoring
/// `stop`. Mirrors the reference client's two scheduling modes.
pub fn run(session: &mut EmitterSession, config: &EmitterConfig, stop: &StopHandle) -> std::io::Result<()> {
    session.send_init()?;

    let start = Instant::now();
    let end = start + config.duration;
    let mut last_data_time = start;

    if config.enable_batching {
        run_batching_mode(session, config, start, end, &mut last_data_time, stop)?;
        session.send_batch()?;
    } else {
        run_normal_mode(session, config, start, end, &mut last_data_time, stop)?;
    }

    Ok(())
}

fn run_batching_mode(
    session: &mut EmitterSession,
    config: &EmitterConfig,
    start: Instant,
    end: Instant,
    last_data_time: &mut Instant,
    stop: &StopHandle,
) -> std::io::Result<()> {
    let mut next_reading_time = start + config.interval;
    let mut next_batch_send_time = start + config.batching_interval;
    let mut next_heartbeat_time = start + config.heartbeat_interval;

    while Instant::now() < end && !stop.is_stopped() {
        let now = Instant::now();

        if now >= next_batch_send_time {
            session.send_batch()?;
            *last_data_time = now;
            next_batch_send_time = now + config.batching_interval;
            next_heartbeat_time = now + config.heartbeat_interval;
        } else if now >= next_reading_time {
            session.add_to_batch(MAX_READINGS_PER_PACKET)?;
            next_reading_time = now + config.interval;
        } else if config.enable_heartbeat
            && now >= next_heartbeat_time
            && now.duration_since(*last_data_time) >= config.heartbeat_interval
        {
            session.send_heartbeat()?;
            next_heartbeat_time = now + config.period_heartbeat;
        }

        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}

fn run_normal_mode(
    session: &mut EmitterSession,
    config: &EmitterConfig,
    start: Instant,
    end: Instant,
    last_data_time: &mut Instant,
    stop: &StopHandle,
) -> std::io::Result<()> {
    let mut next_data_time = start + config.interval;
    let mut next_heartbeat_time = start + config.heartbeat_interval;

    while Instant::now() < end && !stop.is_stopped() {
        let now = Instant::now();

        if now >= next_data_time {
            session.send_data()?;
            *last_data_time = now;
            next_data_time = now + config.interval;
            next_heartbeat_time = now + config.heartbeat_interval;
        } else if config.enable_heartbeat
            && now >= next_heartbeat_time
            && now.duration_since(*last_data_time) >= config.heartbeat_interval
        {
            session.send_heartbeat()?;
            next_heartbeat_time = now + config.period_heartbeat;
        }

        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}
