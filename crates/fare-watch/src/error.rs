// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the monitoring engine.
//!
//! Per-key failures (`FetchTimeout`, `Extraction`, `Parse`) are absorbed by the
//! scheduler and only degrade the observation set. Cycle-level failures
//! (`RendererUnavailable`, `NoValidPrices`, `NotificationDelivery`) turn into a
//! short retry sleep. `Configuration` is the only error allowed to end the process.
//! `Cancelled` ends a cycle early once a stop has been requested.

/// All errors produced by the monitoring engine.
#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("Fetch timed out for {key} after {attempts} attempt(s)")]
    FetchTimeout { key: String, attempts: u32 },

    #[error("No price element found for {key}")]
    Extraction { key: String },

    #[error("Unable to parse price for {key}: {raw:?}")]
    Parse { key: String, raw: String },

    #[error("No valid flight prices found")]
    NoValidPrices,

    #[error("Notification delivery failed: {0}")]
    NotificationDelivery(String),

    /// A stop was requested while the cycle was still running.
    #[error("Cycle cancelled before completion")]
    Cancelled,

    /// A cycle panicked; the payload message is kept for the log line.
    #[error("Unexpected cycle failure: {0}")]
    Unexpected(String),
}

impl MonitorError {
    /// Whether this error must terminate the process instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MonitorError::Configuration(_))
    }

    /// Pipeline stage the error belongs to, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            MonitorError::Configuration(_) => "startup",
            MonitorError::RendererUnavailable(_) | MonitorError::FetchTimeout { .. } => "fetch",
            MonitorError::Extraction { .. } => "extract",
            MonitorError::Parse { .. } => "normalize",
            MonitorError::NoValidPrices => "evaluate",
            MonitorError::NotificationDelivery(_) => "notify",
            MonitorError::Cancelled | MonitorError::Unexpected(_) => "cycle",
        }
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
