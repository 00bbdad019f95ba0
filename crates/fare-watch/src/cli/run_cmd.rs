// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Start the monitor loop in the foreground.

use anyhow::{bail, Context, Result};
use fare_watch::config::MonitorConfig;
use fare_watch::diagnostics::FileDiagnostics;
use fare_watch::history::CycleHistory;
use fare_watch::scheduler::Monitor;
use tokio::sync::watch;

pub async fn run(cfg: MonitorConfig, skip_network_check: bool) -> Result<()> {
    let keys = cfg.validate()?;
    let notifier = cfg.notifier_settings()?.build(cfg.page_load_timeout)?;

    if !skip_network_check && !super::doctor::check_network().await {
        bail!("no internet connection");
    }

    let mut monitor = Monitor::new(cfg.clone(), keys, super::launcher(&cfg), notifier)
        .with_diagnostics(Box::new(FileDiagnostics::new(cfg.diagnostics_dir.clone())));
    if let Some(path) = &cfg.history_path {
        let history = CycleHistory::open(path)
            .with_context(|| format!("failed to open history {}", path.display()))?;
        monitor = monitor.with_history(history);
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(watch_ctrl_c(tx));

    monitor.run(rx).await;
    Ok(())
}

/// First Ctrl-C stops the monitor at its next key; a second one exits at once.
async fn watch_ctrl_c(tx: watch::Sender<bool>) {
    let mut requested = false;
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            // Holding the sender keeps the monitor running.
            std::future::pending::<()>().await;
        }
        if requested {
            tracing::warn!("second interrupt, exiting without cleanup");
            std::process::exit(130);
        }
        requested = true;
        tracing::info!("stop requested, press Ctrl-C again to exit immediately");
        let _ = tx.send(true);
    }
}
