// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entry point: parse CLI flags, open sinks, bind the socket, and run
//! the ingress loop until stopped.

use anyhow::Context;
use clap::Parser;
use std::net::UdpSocket;
use telemetry_collector::config::{Cli, CollectorConfig};
use telemetry_collector::ingress::{self, StopHandle};
use telemetry_collector::metrics::MetricsAccumulator;
use telemetry_collector::registry::DeviceRegistry;
use telemetry_collector::sink::{BatchDetailSink, RowSink};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("telemetry_collector=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config: CollectorConfig = cli.into();

    tracing::info!(
        port = config.port,
        log_file = %config.log_file.display(),
        devices = config.accepted_device_ids.len(),
        "starting telemetry collector"
    );

    let socket = UdpSocket::bind(("0.0.0.0", config.port))
        .map_err(|source| telemetry_collector::error::PipelineError::SocketBind {
            port: config.port,
            source,
        })
        .context("binding UDP ingress socket")?;

    let mut row_sink = RowSink::create(&config.log_file).context("opening primary CSV log")?;
    let mut batch_sink = BatchDetailSink::create(&config.batch_detail_log_file)
        .context("opening batch-detail CSV log")?;
    let mut registry = DeviceRegistry::new(config.max_buffer);
    let mut metrics = MetricsAccumulator::new();

    let stop = StopHandle::new();
    let ctrlc_stop = stop.clone();
    ctrlc::set_handler(move || {
        tracing::info!("received interrupt, shutting down");
        ctrlc_stop.stop();
    })
    .context("installing Ctrl-C handler")?;

    ingress::run(
        &socket,
        &config,
        &mut registry,
        &mut row_sink,
        &mut batch_sink,
        &mut metrics,
        &stop,
    )
    .context("running ingress loop")?;

    let summary = metrics.render_summary(&registry);
    row_sink
        .append_summary_lines(&summary)
        .context("appending shutdown metrics summary")?;

    tracing::info!(
        packets = metrics.packets_received,
        duplicates = metrics.duplicates,
        missing = metrics.missing_positions,
        compliant = metrics.is_compliant(),
        "collector stopped"
    );

    Ok(())
}
