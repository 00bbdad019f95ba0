// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tracing subscriber setup for the binary.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub json: bool,
    /// Also append plain-text output to this file.
    pub file: Option<PathBuf>,
}

impl LogOptions {
    fn directive(&self) -> &'static str {
        if self.verbose {
            "fare_watch=debug"
        } else {
            "fare_watch=info"
        }
    }

    /// `RUST_LOG` takes precedence; the crate directive is added on top.
    pub fn filter(&self) -> Result<EnvFilter> {
        let directive = self
            .directive()
            .parse()
            .context("invalid log directive")?;
        Ok(EnvFilter::from_default_env().add_directive(directive))
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(opts: &LogOptions) -> Result<()> {
    let stderr: Box<dyn Layer<Registry> + Send + Sync> = if opts.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = match &opts.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(f)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .with(opts.filter()?)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
