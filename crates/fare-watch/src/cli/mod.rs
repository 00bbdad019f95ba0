// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the fare-watch binary.

pub mod doctor;
pub mod fetch_cmd;
pub mod keys_cmd;
pub mod run_cmd;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use fare_watch::config::{Backend, MonitorConfig};
use fare_watch::renderer::chromium::{random_user_agent, ChromiumLauncher};
use fare_watch::renderer::http::HttpLauncher;
use fare_watch::renderer::RendererLauncher;
use std::path::PathBuf;

/// Monitor settings. Each flag overrides its `FARE_WATCH_*` environment variable.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Route code, e.g. GOT-BJS
    #[arg(long, global = true)]
    pub destination: Option<String>,

    /// First day of the travel window (YYYY-MM-DD)
    #[arg(long, global = true, value_name = "DATE")]
    pub window_start: Option<NaiveDate>,

    /// Last day of the travel window (YYYY-MM-DD)
    #[arg(long, global = true, value_name = "DATE")]
    pub window_end: Option<NaiveDate>,

    /// Shortest trip to search, in days
    #[arg(long, global = true, value_name = "DAYS")]
    pub min_trip_days: Option<u32>,

    /// Alert when the lowest price is strictly below this amount
    #[arg(long, global = true)]
    pub threshold: Option<u64>,

    /// Seconds between successful checks
    #[arg(long, global = true, value_name = "SECS")]
    pub check_interval: Option<u64>,

    /// Seconds to wait after a failed check
    #[arg(long, global = true, value_name = "SECS")]
    pub retry_interval: Option<u64>,

    /// Page load attempts per search
    #[arg(long, global = true)]
    pub fetch_attempts: Option<u32>,

    /// Seconds to pause between searches in one check
    #[arg(long, global = true, value_name = "SECS")]
    pub request_delay: Option<u64>,

    /// Text that marks a price on the page
    #[arg(long, global = true)]
    pub currency_marker: Option<String>,

    /// Search URL with {destination}, {depart} and {return} placeholders
    #[arg(long, global = true, value_name = "URL")]
    pub query_template: Option<String>,

    /// JSON file with the price locator chain
    #[arg(long, global = true, value_name = "FILE")]
    pub selectors: Option<PathBuf>,

    /// Page renderer: chromium or http
    #[arg(long, global = true)]
    pub backend: Option<Backend>,

    /// Chromium executable
    #[arg(long, global = true, value_name = "PATH")]
    pub chromium_path: Option<PathBuf>,

    /// Where page snapshots are saved when no price is found
    #[arg(long, global = true, value_name = "DIR")]
    pub diagnostics_dir: Option<PathBuf>,

    /// Append one JSON line per check to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// Alert recipient address
    #[arg(long, global = true)]
    pub recipient: Option<String>,

    /// POST alerts to this URL instead of sending email
    #[arg(long, global = true, value_name = "URL")]
    pub webhook_url: Option<String>,
}

impl ConfigArgs {
    /// Defaults, then environment, then these flags.
    pub fn resolve(&self) -> Result<MonitorConfig> {
        let mut cfg = MonitorConfig::from_env()?;
        self.apply(&mut cfg)?;
        Ok(cfg)
    }

    fn apply(&self, cfg: &mut MonitorConfig) -> Result<()> {
        if let Some(v) = &self.destination {
            cfg.destination = v.clone();
        }
        if let Some(v) = self.window_start {
            cfg.window_start = v;
        }
        if let Some(v) = self.window_end {
            cfg.window_end = v;
        }
        if let Some(v) = self.min_trip_days {
            cfg.min_trip_length = v;
        }
        if let Some(v) = self.threshold {
            cfg.threshold = v;
        }
        if let Some(v) = self.check_interval {
            cfg.check_interval = std::time::Duration::from_secs(v);
        }
        if let Some(v) = self.retry_interval {
            cfg.retry_interval = std::time::Duration::from_secs(v);
        }
        if let Some(v) = self.fetch_attempts {
            cfg.max_fetch_attempts = v;
        }
        if let Some(v) = self.request_delay {
            cfg.request_delay = std::time::Duration::from_secs(v);
        }
        if let Some(v) = &self.currency_marker {
            cfg.currency_marker = v.clone();
        }
        if let Some(v) = &self.query_template {
            cfg.query_template = v.clone();
        }
        if let Some(path) = &self.selectors {
            cfg.selectors = Some(fare_watch::config::load_selectors(path)?);
        }
        if let Some(v) = self.backend {
            cfg.backend = v;
        }
        if let Some(v) = &self.chromium_path {
            cfg.chromium_path = Some(v.clone());
        }
        if let Some(v) = &self.diagnostics_dir {
            cfg.diagnostics_dir = v.clone();
        }
        if let Some(v) = &self.history {
            cfg.history_path = Some(v.clone());
        }
        if let Some(v) = &self.recipient {
            cfg.recipient = Some(v.clone());
        }
        if let Some(v) = &self.webhook_url {
            cfg.webhook_url = Some(v.clone());
        }
        Ok(())
    }
}

/// Launcher for the configured backend.
pub fn launcher(cfg: &MonitorConfig) -> Box<dyn RendererLauncher> {
    match cfg.backend {
        Backend::Chromium => Box::new(ChromiumLauncher::new(cfg.chromium_path.clone())),
        Backend::Http => Box::new(HttpLauncher::new(random_user_agent())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = ConfigArgs {
            threshold: Some(6500),
            check_interval: Some(900),
            backend: Some(Backend::Http),
            webhook_url: Some("https://hooks.example.com/x".into()),
            ..ConfigArgs::default()
        };
        let mut cfg = MonitorConfig::default();
        args.apply(&mut cfg).unwrap();

        assert_eq!(cfg.threshold, 6500);
        assert_eq!(cfg.check_interval.as_secs(), 900);
        assert_eq!(cfg.backend, Backend::Http);
        assert_eq!(cfg.destination, "GOT-BJS");
        assert_eq!(cfg.notifier_settings().unwrap().kind(), "webhook");
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let mut cfg = MonitorConfig {
            threshold: 4200,
            ..MonitorConfig::default()
        };
        ConfigArgs::default().apply(&mut cfg).unwrap();
        assert_eq!(cfg.threshold, 4200);
    }
}
