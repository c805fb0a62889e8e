//! Configuration module
//!
//! Per-target transfer configuration: pool geometry, byte counts, option
//! flags, data pattern, and timestamp recording. Configurations are plain
//! serde types loadable from TOML and validated before a transfer starts;
//! CLI argument handling belongs to the embedding tool, not this crate.

use crate::pattern::{DataPatternSpec, PatternKind};
use crate::timestamp::TimestampConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kind of a single IO operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
    NoOp,
    /// End-of-data marker sent on the E2E channel; never a storage IO
    Eof,
}

/// Target-level option flags
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TargetOptions {
    /// Check the 8-byte location header of read buffers. Takes strict
    /// priority over content verification when both are set.
    #[serde(default)]
    pub verify_location: bool,
    /// Check read buffer contents against the configured data pattern
    #[serde(default)]
    pub verify_contents: bool,
    /// Emit periodic lead/lag diagnostics on the E2E source side
    #[serde(default)]
    pub e2e_source_monitor: bool,
}

/// Configuration for one transfer target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target number, used in diagnostic lines
    #[serde(default)]
    pub target_id: u32,
    /// Number of worker slots (concurrency units)
    pub queue_depth: usize,
    /// Block size used for block-number reporting in mismatch logs
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    /// Transfer size of one IO operation
    pub io_size: u64,
    /// Total bytes to transfer in one pass
    pub total_bytes: u64,
    #[serde(default)]
    pub options: TargetOptions,
    #[serde(default)]
    pub pattern: DataPatternSpec,
    /// Timestamp ring configuration; absent means no recording
    pub timestamp: Option<TimestampConfig>,
    /// Cap on detailed per-mismatch log lines for sequenced verification
    #[serde(default = "default_max_errors_to_print")]
    pub max_errors_to_print: u64,
}

fn default_block_size() -> u64 {
    4096
}

fn default_max_errors_to_print() -> u64 {
    10
}

impl TargetConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("Failed to parse target configuration")
    }

    /// Load a configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Number of operations one pass will issue
    pub fn target_ops(&self) -> u64 {
        if self.io_size == 0 {
            return 0;
        }
        self.total_bytes.div_ceil(self.io_size)
    }

    /// Validate the configuration before starting a transfer
    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 || self.queue_depth > 1024 {
            anyhow::bail!(
                "queue_depth must be between 1 and 1024, got {}",
                self.queue_depth
            );
        }
        if self.io_size == 0 {
            anyhow::bail!("io_size must be greater than 0");
        }
        if self.block_size == 0 {
            anyhow::bail!("block_size must be greater than 0");
        }
        match self.pattern.kind {
            Some(PatternKind::Hex) | Some(PatternKind::SingleChar) => {
                if self.pattern.bytes.is_empty() {
                    anyhow::bail!("hex and single-char patterns require pattern bytes");
                }
            }
            _ => {}
        }
        if self.options.verify_contents && self.pattern.kind.is_none() {
            anyhow::bail!("verify_contents requires a configured data pattern");
        }
        Ok(())
    }
}
