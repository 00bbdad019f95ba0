// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Monitor configuration: built-in defaults, overridden by `FARE_WATCH_*`
//! environment variables, overridden in turn by command-line flags.
//!
//! The configuration is immutable once the monitor starts.

use crate::error::{MonitorError, MonitorResult};
use crate::extract::{default_chain, default_consent_button};
use crate::keys::{build_key_set, QueryTemplate, SearchKeySet};
use crate::notify::{NotifierSettings, SmtpSettings};
use crate::renderer::Locator;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DESTINATION: &str = "GOT-BJS";
pub const DEFAULT_MIN_TRIP_DAYS: u32 = 16;
pub const DEFAULT_THRESHOLD: u64 = 8000;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 1800;
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
pub const DEFAULT_FETCH_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SELECTOR_WAIT_SECS: u64 = 20;
pub const DEFAULT_CONSENT_WAIT_SECS: u64 = 5;
pub const DEFAULT_REQUEST_DELAY_SECS: u64 = 2;
pub const DEFAULT_CURRENCY_MARKER: &str = "kr";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

pub const DEFAULT_QUERY_TEMPLATE: &str = "https://www.kayak.se/flights/{destination}/{depart}/{return}?ucs=1hk4vhy&sort=price_a&fs=cfc=1;takeoff=1012,2230__;layoverdur=-300;legdur=-1500;stops=1;bfc=1";

/// Page rendering backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Headless Chromium; required for script-rendered result pages.
    Chromium,
    /// Plain HTTP fetch parsed as static HTML.
    Http,
}

impl FromStr for Backend {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Backend::Chromium),
            "http" => Ok(Backend::Http),
            other => Err(MonitorError::Configuration(format!(
                "unknown backend {other:?} (expected chromium or http)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub destination: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub min_trip_length: u32,
    pub threshold: u64,
    pub check_interval: Duration,
    pub retry_interval: Duration,
    pub max_fetch_attempts: u32,
    pub fetch_retry_delay: Duration,
    pub page_load_timeout: Duration,
    pub selector_wait: Duration,
    pub consent_wait: Duration,
    /// Pause between consecutive keys in a cycle.
    pub request_delay: Duration,
    pub currency_marker: String,
    pub query_template: String,
    /// Custom locator chain; `None` uses the built-in chain for `currency_marker`.
    pub selectors: Option<Vec<Locator>>,
    pub consent_button: Option<Locator>,
    pub backend: Backend,
    pub chromium_path: Option<PathBuf>,
    pub diagnostics_dir: PathBuf,
    pub history_path: Option<PathBuf>,
    pub recipient: Option<String>,
    pub webhook_url: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_from: Option<String>,
    pub smtp_password: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            destination: DEFAULT_DESTINATION.to_string(),
            window_start: NaiveDate::from_ymd_opt(2025, 12, 21).unwrap_or_default(),
            window_end: NaiveDate::from_ymd_opt(2026, 1, 11).unwrap_or_default(),
            min_trip_length: DEFAULT_MIN_TRIP_DAYS,
            threshold: DEFAULT_THRESHOLD,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            max_fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            fetch_retry_delay: Duration::from_secs(DEFAULT_FETCH_RETRY_DELAY_SECS),
            page_load_timeout: Duration::from_secs(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
            selector_wait: Duration::from_secs(DEFAULT_SELECTOR_WAIT_SECS),
            consent_wait: Duration::from_secs(DEFAULT_CONSENT_WAIT_SECS),
            request_delay: Duration::from_secs(DEFAULT_REQUEST_DELAY_SECS),
            currency_marker: DEFAULT_CURRENCY_MARKER.to_string(),
            query_template: DEFAULT_QUERY_TEMPLATE.to_string(),
            selectors: None,
            consent_button: Some(default_consent_button()),
            backend: Backend::Chromium,
            chromium_path: None,
            diagnostics_dir: PathBuf::from("."),
            history_path: None,
            recipient: None,
            webhook_url: None,
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_from: None,
            smtp_password: None,
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> MonitorResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    pub fn from_lookup<F>(lookup: F) -> MonitorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut cfg = Self::default();

        if let Some(v) = env.string("FARE_WATCH_DESTINATION") {
            cfg.destination = v;
        }
        if let Some(v) = env.date("FARE_WATCH_WINDOW_START")? {
            cfg.window_start = v;
        }
        if let Some(v) = env.date("FARE_WATCH_WINDOW_END")? {
            cfg.window_end = v;
        }
        if let Some(v) = env.parse("FARE_WATCH_MIN_TRIP_DAYS")? {
            cfg.min_trip_length = v;
        }
        if let Some(v) = env.parse("FARE_WATCH_THRESHOLD")? {
            cfg.threshold = v;
        }
        if let Some(v) = env.secs("FARE_WATCH_CHECK_INTERVAL_SECS")? {
            cfg.check_interval = v;
        }
        if let Some(v) = env.secs("FARE_WATCH_RETRY_INTERVAL_SECS")? {
            cfg.retry_interval = v;
        }
        if let Some(v) = env.parse("FARE_WATCH_FETCH_ATTEMPTS")? {
            cfg.max_fetch_attempts = v;
        }
        if let Some(v) = env.secs("FARE_WATCH_FETCH_RETRY_DELAY_SECS")? {
            cfg.fetch_retry_delay = v;
        }
        if let Some(v) = env.secs("FARE_WATCH_PAGE_LOAD_TIMEOUT_SECS")? {
            cfg.page_load_timeout = v;
        }
        if let Some(v) = env.secs("FARE_WATCH_SELECTOR_WAIT_SECS")? {
            cfg.selector_wait = v;
        }
        if let Some(v) = env.secs("FARE_WATCH_CONSENT_WAIT_SECS")? {
            cfg.consent_wait = v;
        }
        if let Some(v) = env.secs("FARE_WATCH_REQUEST_DELAY_SECS")? {
            cfg.request_delay = v;
        }
        if let Some(v) = env.string("FARE_WATCH_CURRENCY_MARKER") {
            cfg.currency_marker = v;
        }
        if let Some(v) = env.string("FARE_WATCH_QUERY_TEMPLATE") {
            cfg.query_template = v;
        }
        if let Some(v) = env.string("FARE_WATCH_SELECTORS") {
            cfg.selectors = Some(load_selectors(Path::new(&v))?);
        }
        if let Some(v) = env.string("FARE_WATCH_BACKEND") {
            cfg.backend = v.parse()?;
        }
        if let Some(v) = env.string("FARE_WATCH_CHROMIUM_PATH") {
            cfg.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env.string("FARE_WATCH_DIAGNOSTICS_DIR") {
            cfg.diagnostics_dir = PathBuf::from(v);
        }
        if let Some(v) = env.string("FARE_WATCH_HISTORY") {
            cfg.history_path = Some(PathBuf::from(v));
        }
        cfg.recipient = env
            .string("FARE_WATCH_RECIPIENT")
            .or_else(|| env.string("SMTP_TO"));
        cfg.webhook_url = env.string("FARE_WATCH_WEBHOOK_URL");

        if let Some(v) = env.string("SMTP_HOST") {
            cfg.smtp_host = v;
        }
        if let Some(v) = env.parse("SMTP_PORT")? {
            cfg.smtp_port = v;
        }
        cfg.smtp_from = env.string("SMTP_FROM");
        cfg.smtp_password = env.string("SMTP_PASSWORD");

        Ok(cfg)
    }

    /// Check every setting and build the key set the monitor will poll.
    pub fn validate(&self) -> MonitorResult<SearchKeySet> {
        if self.destination.trim().is_empty() {
            return Err(config_error("destination must not be empty"));
        }
        if self.threshold == 0 {
            return Err(config_error("price threshold must be positive"));
        }
        if self.check_interval.is_zero() {
            return Err(config_error("check interval must be positive"));
        }
        if self.retry_interval.is_zero() {
            return Err(config_error("retry interval must be positive"));
        }
        if self.max_fetch_attempts == 0 {
            return Err(config_error("at least one fetch attempt is required"));
        }
        if self.currency_marker.trim().is_empty() {
            return Err(config_error("currency marker must not be empty"));
        }
        if self.selectors.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(config_error("selector chain must not be empty"));
        }

        let template = QueryTemplate::new(self.query_template.clone())?;
        build_key_set(
            &self.destination,
            self.window_start,
            self.window_end,
            self.min_trip_length,
            &template,
        )
    }

    /// The locator chain in effect.
    pub fn selector_chain(&self) -> Vec<Locator> {
        self.selectors
            .clone()
            .unwrap_or_else(|| default_chain(&self.currency_marker))
    }

    /// Resolve the alert channel: a webhook URL wins, otherwise SMTP credentials are required.
    pub fn notifier_settings(&self) -> MonitorResult<NotifierSettings> {
        if let Some(url) = &self.webhook_url {
            return Ok(NotifierSettings::Webhook { url: url.clone() });
        }

        let missing: Vec<&str> = [
            ("SMTP_FROM", self.smtp_from.is_none()),
            ("SMTP_PASSWORD", self.smtp_password.is_none()),
            ("SMTP_TO", self.recipient.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(MonitorError::Configuration(format!(
                "email alerts need {} (or set --webhook-url)",
                missing.join(", ")
            )));
        }

        Ok(NotifierSettings::Email(SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            from: self.smtp_from.clone().unwrap_or_default(),
            password: self.smtp_password.clone().unwrap_or_default(),
        }))
    }

    /// Address placed on outgoing alerts.
    pub fn alert_recipient(&self) -> String {
        self.recipient.clone().unwrap_or_default()
    }
}

/// Read a JSON array of locators, e.g. `[{"kind": "css", "value": ".price"}]`.
pub fn load_selectors(path: &Path) -> MonitorResult<Vec<Locator>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        MonitorError::Configuration(format!("cannot read selectors {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        MonitorError::Configuration(format!("invalid selectors {}: {e}", path.display()))
    })
}

pub fn parse_date(name: &str, value: &str) -> MonitorResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        MonitorError::Configuration(format!("{name}: expected YYYY-MM-DD, got {value:?} ({e})"))
    })
}

fn config_error(msg: &str) -> MonitorError {
    MonitorError::Configuration(msg.to_string())
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, name: &str) -> MonitorResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(name)
            .map(|v| {
                v.parse::<T>().map_err(|e| {
                    MonitorError::Configuration(format!("{name}: invalid value {v:?} ({e})"))
                })
            })
            .transpose()
    }

    fn secs(&self, name: &str) -> MonitorResult<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_secs))
    }

    fn date(&self, name: &str) -> MonitorResult<Option<NaiveDate>> {
        self.string(name).map(|v| parse_date(name, &v)).transpose()
    }
}
