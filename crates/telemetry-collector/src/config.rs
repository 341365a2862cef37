// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CLI flags and the validated runtime configuration built from them.

use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;

/// UDP telemetry collector: reorders, reconciles gaps, and logs
/// sensor readings to a CSV file.
#[derive(Parser, Debug)]
#[command(name = "telemetry-collector")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Collect, reorder, and reconcile UDP telemetry frames")]
pub struct Cli {
    /// UDP port to bind.
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Primary CSV output log.
    #[arg(long, default_value = "telemetry.csv")]
    pub log_file: PathBuf,

    /// Reorder buffer capacity per device.
    #[arg(long, default_value_t = 1000)]
    pub max_buffer: u32,

    /// Gap timeout in seconds before a stalled gap is force-closed.
    #[arg(long, default_value_t = 5)]
    pub max_gap_wait: u64,

    /// Exit after this many idle seconds with no traffic on any device.
    #[arg(long)]
    pub auto_shutdown: Option<u64>,

    /// Accepted device ids, comma-separated. Defaults to the three
    /// demo device ids used by the reference sensor emitters.
    #[arg(long, value_delimiter = ',', default_value = "3001,3002,3003")]
    pub device_ids: Vec<u16>,

    /// Raise the local crate's tracing filter to debug.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated, typed configuration derived from [`Cli`].
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub port: u16,
    pub log_file: PathBuf,
    pub batch_detail_log_file: PathBuf,
    pub max_buffer: u32,
    pub max_gap_wait: std::time::Duration,
    pub auto_shutdown: Option<std::time::Duration>,
    pub accepted_device_ids: HashSet<u16>,
}

impl From<Cli> for CollectorConfig {
    fn from(cli: Cli) -> Self {
        let batch_detail_log_file = derive_batch_detail_path(&cli.log_file);
        Self {
            port: cli.port,
            log_file: cli.log_file,
            batch_detail_log_file,
            max_buffer: cli.max_buffer,
            max_gap_wait: std::time::Duration::from_secs(cli.max_gap_wait),
            auto_shutdown: cli.auto_shutdown.map(std::time::Duration::from_secs),
            accepted_device_ids: cli.device_ids.into_iter().collect(),
        }
    }
}

/// Replace a trailing `.csv` with `_batch_details.csv`; otherwise
/// append the suffix.
fn derive_batch_detail_path(primary: &std::path::Path) -> PathBuf {
    let as_str = primary.to_string_lossy();
    if let Some(stem) = as_str.strip_suffix(".csv") {
        PathBuf::from(format!("{stem}_batch_details.csv"))
    } else {
        PathBuf::from(format!("{as_str}_batch_details.csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specification() {
        let cli = Cli::parse_from(["telemetry-collector"]);
        assert_eq!(cli.port, 5000);
        assert_eq!(cli.log_file, PathBuf::from("telemetry.csv"));
        assert_eq!(cli.max_buffer, 1000);
        assert_eq!(cli.max_gap_wait, 5);
        assert_eq!(cli.auto_shutdown, None);
        assert_eq!(cli.device_ids, vec![3001, 3002, 3003]);
    }

    #[test]
    fn batch_detail_path_substitutes_csv_suffix() {
        assert_eq!(
            derive_batch_detail_path(std::path::Path::new("telemetry.csv")),
            PathBuf::from("telemetry_batch_details.csv")
        );
        assert_eq!(
            derive_batch_detail_path(std::path::Path::new("out/run1.csv")),
            PathBuf::from("out/run1_batch_details.csv")
        );
    }

    #[test]
    fn cli_converts_into_config() {
        let cli = Cli::parse_from([
            "telemetry-collector",
            "--port",
            "6000",
            "--max-gap-wait",
            "2",
        ]);
        let config: CollectorConfig = cli.into();
        assert_eq!(config.port, 6000);
        assert_eq!(config.max_gap_wait, std::time::Duration::from_secs(2));
        assert!(config.accepted_device_ids.contains(&3001));
    }
}
