// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Append-only JSONL record of monitor cycles.
//!
//! One line per cycle. The file rotates to `.1`, `.2`, ... once it grows past
//! `max_bytes`; at most `MAX_ROTATIONS` old files are kept.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default size before rotation (10 MB).
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

const MAX_ROTATIONS: u32 = 5;

/// Outcome of one cycle as written to the history file.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    pub timestamp: String,
    pub cycle: u64,
    pub outcome: String,
    pub observations: usize,
    pub valid_prices: usize,
    pub lowest: Option<u64>,
    pub fired: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleRecord {
    pub fn now(cycle: u64, outcome: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            cycle,
            outcome: outcome.to_string(),
            observations: 0,
            valid_prices: 0,
            lowest: None,
            fired: false,
            duration_ms: 0,
            error: None,
        }
    }
}

pub struct CycleHistory {
    file: File,
    path: PathBuf,
    current_size: u64,
    max_bytes: u64,
}

impl CycleHistory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_max_bytes(path, DEFAULT_MAX_BYTES)
    }

    pub fn with_max_bytes(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let file = open_append(&path)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path,
            current_size,
            max_bytes: max_bytes.max(1),
        })
    }

    pub fn append(&mut self, record: &CycleRecord) -> Result<()> {
        if self.current_size >= self.max_bytes {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)?;
        writeln!(self.file, "{line}")
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        self.current_size += line.len() as u64 + 1;
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            std::fs::remove_file(&oldest)
                .with_context(|| format!("failed to remove {}", oldest.display()))?;
        }
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                std::fs::rename(&from, rotation_path(&self.path, i + 1))?;
            }
        }
        std::fs::rename(&self.path, rotation_path(&self.path, 1))?;

        self.file = open_append(&self.path)?;
        self.current_size = 0;
        tracing::debug!(path = %self.path.display(), "cycle history rotated");
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open cycle history: {}", path.display()))
}

/// `history.jsonl` -> `history.jsonl.3`
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("history.jsonl");
    base.with_file_name(format!("{name}.{index}"))
}
