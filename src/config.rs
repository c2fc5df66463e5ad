//! Configuration loading from TOML.
//!
//! Reads `config.toml` once at startup and deserializes it into an
//! immutable `AppConfig`. The value is validated before any processing
//! and then passed explicitly to every stage; nothing reads configuration
//! ad hoc mid-pipeline.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::types::PropError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// Thresholds and sizing for a pipeline run.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Games in the rolling window.
    pub window_size: usize,
    /// Minimum confidence score (0–100) to keep a scored prop.
    pub min_confidence: u8,
    /// Minimum absolute edge (probability fraction) to keep a scored prop.
    pub min_edge: f64,
    pub top_k: usize,
    /// Worker pool size for feature building and scoring.
    pub concurrency: usize,
    pub model_version: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeatureConfig {
    /// Short window for the recent-form mean.
    pub recent_window: usize,
    pub league_avg_pace: f64,
    pub league_avg_def_rating: f64,
    /// Games below this many minutes count as DNPs.
    pub min_minutes: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            recent_window: 5,
            league_avg_pace: 99.5,
            league_avg_def_rating: 114.0,
            min_minutes: 1.0,
        }
    }
}

/// Which probability model implementation to load.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Distribution,
    Logistic,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelConfig {
    #[serde(default)]
    pub kind: ModelKind,
    /// Pre-fit coefficient file, required for the logistic model.
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,
}

/// Timeouts and retry policy for history/context lookups.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_attempts: 3,
            backoff_ms: 250,
        }
    }
}

impl DataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to load config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse configuration TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check every recognised option is in range.
    pub fn validate(&self) -> Result<(), PropError> {
        let p = &self.pipeline;
        if p.window_size == 0 {
            return Err(PropError::Config("pipeline.window_size must be at least 1".into()));
        }
        if p.min_confidence > 100 {
            return Err(PropError::Config(format!(
                "pipeline.min_confidence must be in 0..=100, got {}",
                p.min_confidence
            )));
        }
        if !(0.0..=1.0).contains(&p.min_edge) {
            return Err(PropError::Config(format!(
                "pipeline.min_edge must be in [0, 1], got {}",
                p.min_edge
            )));
        }
        if p.top_k == 0 {
            return Err(PropError::Config("pipeline.top_k must be positive".into()));
        }
        if p.concurrency == 0 || p.concurrency > Semaphore::MAX_PERMITS {
            return Err(PropError::Config(format!(
                "pipeline.concurrency must be in 1..={}, got {}",
                Semaphore::MAX_PERMITS,
                p.concurrency
            )));
        }
        if p.model_version.trim().is_empty() {
            return Err(PropError::Config("pipeline.model_version must not be empty".into()));
        }

        let f = &self.features;
        if f.recent_window == 0 {
            return Err(PropError::Config("features.recent_window must be at least 1".into()));
        }
        if !(f.league_avg_pace > 0.0) || !(f.league_avg_def_rating > 0.0) {
            return Err(PropError::Config("features league averages must be positive".into()));
        }
        if !(f.min_minutes >= 0.0) {
            return Err(PropError::Config("features.min_minutes must be non-negative".into()));
        }

        if self.model.kind == ModelKind::Logistic && self.model.artifact_path.is_none() {
            return Err(PropError::Config(
                "model.artifact_path is required for the logistic model".into(),
            ));
        }

        if self.data.max_attempts == 0 || self.data.timeout_ms == 0 {
            return Err(PropError::Config(
                "data.max_attempts and data.timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// A valid configuration with defaults, used by tests and examples.
    pub fn with_pipeline(pipeline: PipelineConfig) -> Self {
        Self {
            pipeline,
            features: FeatureConfig::default(),
            model: ModelConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_confidence: 10,
            min_edge: 0.03,
            top_k: 20,
            concurrency: 8,
            model_version: "dist-v2".to_string(),
        }
    }
}
