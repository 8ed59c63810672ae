//! Run configuration loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation_engine::{DistributionTarget, GenerationRequest, ShortfallPolicy, ShuffleMode};

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Base per-set distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DistributionConfig {
    /// Exact question counts per tier.
    Absolute { hard: i64, medium: i64, easy: i64 },
    /// Percent shares of `total` questions per set.
    Percentage { hard: f64, medium: f64, easy: f64, total: usize },
}

impl Default for DistributionConfig {
    fn default() -> Self {
        DistributionConfig::Absolute { hard: 4, medium: 6, easy: 5 }
    }
}

impl DistributionConfig {
    pub fn to_target(&self) -> DistributionTarget {
        match *self {
            DistributionConfig::Absolute { hard, medium, easy } => {
                DistributionTarget::absolute(hard, medium, easy)
            }
            DistributionConfig::Percentage { hard, medium, easy, total } => {
                DistributionTarget::percentage(hard, medium, easy, total)
            }
        }
    }
}

/// Absolute counts for a single set, replacing the base distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOverride {
    /// 1-based set number
    pub set: usize,
    pub hard: i64,
    pub medium: i64,
    pub easy: i64,
}

/// Top-level run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of sets to generate
    #[serde(default = "default_sets")]
    pub sets: usize,
    /// Seed for reproducible runs; absent means entropy
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub shuffle: ShuffleMode,
    #[serde(default)]
    pub shortfall: ShortfallPolicy,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub overrides: Vec<SetOverride>,
    /// Directory the workbook is written to
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

const fn default_sets() -> usize {
    50
}

fn default_output() -> PathBuf {
    PathBuf::from("output")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sets: default_sets(),
            seed: None,
            shuffle: ShuffleMode::default(),
            shortfall: ShortfallPolicy::default(),
            distribution: DistributionConfig::default(),
            overrides: Vec::new(),
            output: default_output(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Build the engine request. Range checks happen in the planner.
    pub fn to_request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.sets, self.distribution.to_target())
            .with_shuffle(self.shuffle)
            .with_policy(self.shortfall);
        request.rng_seed = self.seed;
        for o in &self.overrides {
            request = request.with_override(o.set, DistributionTarget::absolute(o.hard, o.medium, o.easy));
        }
        request
    }
}
