// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use anyhow::Result;
use fare_watch::config::{Backend, MonitorConfig};
use fare_watch::renderer::chromium::find_chromium;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

const CHECK_ADDR: &str = "8.8.8.8:53";
const CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Whether a TCP connection to a public DNS server succeeds.
pub async fn check_network() -> bool {
    let Ok(addr) = CHECK_ADDR.parse::<SocketAddr>() else {
        return false;
    };
    matches!(
        tokio::time::timeout(CHECK_TIMEOUT, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Check network, Chromium, configuration and notifier settings.
pub async fn run(cfg: &MonitorConfig) -> Result<()> {
    println!("fare-watch doctor");
    println!("=================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let online = check_network().await;
    if online {
        println!("[OK] Internet connection ({CHECK_ADDR} reachable)");
    } else {
        println!("[!!] No internet connection ({CHECK_ADDR} unreachable)");
    }

    let chromium = find_chromium(cfg.chromium_path.as_deref());
    let chromium_ok = match (&chromium, &cfg.chromium_path, cfg.backend) {
        (Some(path), _, _) => {
            println!("[OK] Chromium found: {}", path.display());
            true
        }
        (None, Some(configured), Backend::Chromium) => {
            println!("[!!] Configured Chromium does not exist: {}", configured.display());
            false
        }
        (None, _, Backend::Chromium) => {
            println!("[!!] Chromium NOT found. Set FARE_WATCH_CHROMIUM_PATH or install Chrome.");
            false
        }
        (None, _, Backend::Http) => {
            println!("[??] Chromium not found (not needed by the http backend)");
            true
        }
    };

    let config_ok = match cfg.validate() {
        Ok(keys) => {
            println!(
                "[OK] Configuration valid: {} searches for {}",
                keys.len(),
                cfg.destination
            );
            true
        }
        Err(e) => {
            println!("[!!] {e}");
            false
        }
    };

    let notifier_ok = match cfg.notifier_settings() {
        Ok(settings) => {
            println!("[OK] Alerts via {}", settings.kind());
            true
        }
        Err(e) => {
            println!("[!!] {e}");
            false
        }
    };

    println!();
    if online && chromium_ok && config_ok && notifier_ok {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
