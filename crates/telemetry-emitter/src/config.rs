// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CLI flags and validated configuration for the sensor emitter.

use clap::{Parser, ValueEnum};
use std::time::Duration;
use telemetry_wire::SensorKind;

/// Sensor kind this emitter generates readings for.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKindArg {
    Temperature,
    Humidity,
    Voltage,
}

impl From<SensorKindArg> for SensorKind {
    fn from(arg: SensorKindArg) -> Self {
        match arg {
            SensorKindArg::Temperature => SensorKind::Temperature,
            SensorKindArg::Humidity => SensorKind::Humidity,
            SensorKindArg::Voltage => SensorKind::Voltage,
        }
    }
}

/// Deterministic UDP sensor emitter, one process per simulated device.
#[derive(Parser, Debug)]
#[command(name = "telemetry-emitter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Emit deterministic UDP telemetry frames for one simulated device")]
pub struct Cli {
    #[arg(long, default_value_t = 3001)]
    pub device_id: u16,

    #[arg(long, default_value = "127.0.0.1")]
    pub server_host: String,

    #[arg(long, default_value_t = 5000)]
    pub server_port: u16,

    /// Seconds between reading collections (normal mode: between DATA
    /// sends; batching mode: between batch-buffer additions).
    #[arg(long, default_value_t = 2.0)]
    pub interval: f64,

    /// Total run time in seconds.
    #[arg(long, default_value_t = 20.0)]
    pub duration: f64,

    /// Deterministic RNG seed. Defaults to `10000 + device_id`.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = SensorKindArg::Temperature)]
    pub sensor_kind: SensorKindArg,

    /// Idle time before heartbeats begin, and the reset threshold
    /// after any DATA/BATCH send.
    #[arg(long, default_value_t = 10.0)]
    pub heartbeat_interval: f64,

    /// Interval between heartbeats once the idle threshold is reached.
    #[arg(long, default_value_t = 3.0)]
    pub period_heartbeat: f64,

    #[arg(long, default_value_t = false)]
    pub enable_heartbeat: bool,

    #[arg(long, default_value_t = false)]
    pub enable_batching: bool,

    /// Interval between batch flushes, in batching mode.
    #[arg(long, default_value_t = 10.0)]
    pub batching_interval: f64,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated, typed configuration derived from [`Cli`].
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    pub device_id: u16,
    pub server_addr: String,
    pub interval: Duration,
    pub duration: Duration,
    pub seed: u64,
    pub sensor_kind: SensorKind,
    pub heartbeat_interval: Duration,
    pub period_heartbeat: Duration,
    pub enable_heartbeat: bool,
    pub enable_batching: bool,
    pub batching_interval: Duration,
}

impl From<Cli> for EmitterConfig {
    fn from(cli: Cli) -> Self {
        let seed = cli.seed.unwrap_or(10_000 + cli.device_id as u64);
        Self {
            device_id: cli.device_id,
            server_addr: format!("{}:{}", cli.server_host, cli.server_port),
            interval: Duration::from_secs_f64(cli.interval),
            duration: Duration::from_secs_f64(cli.duration),
            seed,
            sensor_kind: cli.sensor_kind.into(),
            heartbeat_interval: Duration::from_secs_f64(cli.heartbeat_interval),
            period_heartbeat: Duration::from_secs_f64(cli.period_heartbeat),
            enable_heartbeat: cli.enable_heartbeat,
            enable_batching: cli.enable_batching,
            batching_interval: Duration::from_secs_f64(cli.batching_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_client() {
        let cli = Cli::parse_from(["telemetry-emitter"]);
        assert_eq!(cli.device_id, 3001);
        assert_eq!(cli.server_host, "127.0.0.1");
        assert_eq!(cli.server_port, 5000);
        assert_eq!(cli.interval, 2.0);
        assert_eq!(cli.duration, 20.0);
        assert_eq!(cli.heartbeat_interval, 10.0);
        assert_eq!(cli.period_heartbeat, 3.0);
        assert_eq!(cli.batching_interval, 10.0);
        assert!(!cli.enable_heartbeat);
        assert!(!cli.enable_batching);
    }

    #[test]
    fn seed_defaults_to_device_offset() {
        let cli = Cli::parse_from(["telemetry-emitter", "--device-id", "3002"]);
        let config: EmitterConfig = cli.into();
        assert_eq!(config.seed, 13002);
    }

    #[test]
    fn explicit_seed_overrides_default() {
        let cli = Cli::parse_from(["telemetry-emitter", "--seed", "77"]);
        let config: EmitterConfig = cli.into();
        assert_eq!(config.seed, 77);
    }
}
