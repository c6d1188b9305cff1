// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fpd`, the execution-plane daemon.
//!
//! Exit codes: 0 on a clean shutdown, 1 on initialization failure.

use fp_daemon::lifecycle::{self, Config};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fpd: {}", e);
            std::process::exit(1);
        }
    };

    // The file appender needs the directory before startup creates it.
    let _ = std::fs::create_dir_all(&config.logs_dir);
    let _log_guard = init_tracing(&config);

    let daemon = match lifecycle::startup(config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    wait_for_shutdown_signal().await;
    lifecycle::shutdown(daemon).await;
}

/// Console logging filtered by FP_LOG/RUST_LOG, plus a non-blocking file
/// appender under the state directory.
fn init_tracing(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = EnvFilter::try_from_env("FP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::never(&config.logs_dir, "fpd.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();
    guard
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::error!(error = %e, "cannot install SIGTERM handler");
            // Fall back to ctrl-c only.
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = tokio::signal::ctrl_c() => tracing::info!("received interrupt"),
    }
}
