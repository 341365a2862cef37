// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entry point: parse CLI flags, bind a UDP socket, and run the
//! priority-ordered send loop until the duration elapses or Ctrl-C.

use anyhow::Context;
use clap::Parser;
use telemetry_emitter::config::{Cli, EmitterConfig};
use telemetry_emitter::schedule::{self, EmitterSession, StopHandle};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("telemetry_emitter=debug,info")
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
    let config: EmitterConfig = cli.into();

    tracing::info!(
        device_id = config.device_id,
        server = %config.server_addr,
        seed = config.seed,
        batching = config.enable_batching,
        heartbeat = config.enable_heartbeat,
        "starting sensor emitter"
    );

    let mut session = EmitterSession::new(&config).context("binding emitter UDP socket")?;

    let stop = StopHandle::new();
    let ctrlc_stop = stop.clone();
    ctrlc::set_handler(move || {
        tracing::info!("received interrupt, sending final batch and stopping");
        ctrlc_stop.stop();
    })
    .context("installing Ctrl-C handler")?;

    schedule::run(&mut session, &config, &stop).context("running send loop")?;

    tracing::info!(device_id = config.device_id, "emitter finished, socket closed");
    Ok(())
}
