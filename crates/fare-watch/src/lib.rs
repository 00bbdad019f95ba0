// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! fare-watch: polls travel-search result pages for a set of itineraries and
//! alerts when the cheapest fare drops below a threshold.
//!
//! The library exposes the monitoring engine so it can be driven by the binary
//! and by integration tests with in-memory renderers and notifiers.

pub mod alert;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod history;
pub mod keys;
pub mod logging;
pub mod normalize;
pub mod notify;
pub mod renderer;
pub mod retry;
pub mod scheduler;

pub use error::{MonitorError, MonitorResult};
