// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic page snapshots saved when no price could be extracted.

use crate::keys::SearchKey;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Write-only sink for page markup. Nothing in the monitor reads snapshots back.
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    async fn save(&self, key: &SearchKey, markup: &str) -> Result<()>;
}

/// Saves snapshots as `debug_page_{key}.html` in a directory.
pub struct FileDiagnostics {
    dir: PathBuf,
}

impl FileDiagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &SearchKey) -> PathBuf {
        self.dir.join(format!("debug_page_{key}.html"))
    }
}

#[async_trait]
impl DiagnosticsSink for FileDiagnostics {
    async fn save(&self, key: &SearchKey, markup: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.path_for(key);
        tokio::fs::write(&path, markup)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!(key = %key, path = %path.display(), "page source saved for debugging");
        Ok(())
    }
}
