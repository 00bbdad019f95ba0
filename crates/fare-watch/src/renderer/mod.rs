// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for fetching search result pages.
//!
//! A [`RendererLauncher`] starts a browser engine once per cycle. The engine hands out
//! [`RenderContext`]s (tabs) that navigate to a query URL and answer element lookups
//! for the price extractor. Two backends ship with the crate: headless Chromium via
//! chromiumoxide, and a plain HTTP fetcher that evaluates selectors with `scraper`.

pub mod chromium;
pub mod http;
pub mod html;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How to locate an element on a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// CSS selector; the first matching element.
    Css(String),
    /// XPath expression; the first matching node. Browser backends only.
    XPath(String),
    /// First element whose own text contains the given string.
    TextContains(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
            Locator::TextContains(s) => write!(f, "text:{s}"),
        }
    }
}

/// Errors raised by renderer backends.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),

    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no element matched {locator} within {waited_ms}ms")]
    NotFound { locator: String, waited_ms: u64 },

    #[error("locator not supported by this backend: {0}")]
    Unsupported(String),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("no page loaded")]
    NoPage,
}

/// Starts a browser engine. Called once at the beginning of every cycle.
#[async_trait]
pub trait RendererLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError>;
}

/// A running browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError>;
    /// Shut down the engine and release its process.
    async fn shutdown(self: Box<Self>) -> Result<(), RenderError>;
}

/// A single browser context used to load result pages one after another.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL, failing if the load exceeds `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Click a consent dialog button if one shows up within `wait`.
    ///
    /// Returns whether a button was clicked. Absence of a dialog is not an error.
    async fn dismiss_consent(&mut self, button: &Locator, wait: Duration)
        -> Result<bool, RenderError>;

    /// Text of the first element matching `locator`, waiting up to `wait` for it to appear.
    async fn find_first_match(&self, locator: &Locator, wait: Duration)
        -> Result<String, RenderError>;

    /// Full markup of the current page.
    async fn get_html(&self) -> Result<String, RenderError>;

    /// Close this context.
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::Css("span.price".into()).to_string(), "css:span.price");
        assert_eq!(Locator::TextContains("kr".into()).to_string(), "text:kr");
    }

    #[test]
    fn test_locator_serde() {
        let json = serde_json::to_string(&Locator::XPath("//span".into())).unwrap();
        assert_eq!(json, r#"{"kind":"x_path","value":"//span"}"#);
        let back: Locator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Locator::XPath("//span".into()));
    }
}
