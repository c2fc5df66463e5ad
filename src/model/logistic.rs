//! Logistic-regression model loaded from a pre-fit coefficient file.
//!
//! Artifact format (JSON):
//!
//! ```json
//! {
//!   "version": "logit-2025-12",
//!   "intercept": -0.4,
//!   "weights": { "projection": 0.21, "line": -0.2 },
//!   "market_offsets": { "threes_made": -0.1 }
//! }
//! ```
//!
//! Weight keys must be feature names from the builder's schema.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::ProbabilityModel;
use crate::features::{PlayerFeatureVector, FEATURE_NAMES};
use crate::types::MarketType;

/// Fitted coefficients as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub version: String,
    pub intercept: f64,
    pub weights: BTreeMap<String, f64>,
    /// Additive intercept adjustment per stat category.
    #[serde(default)]
    pub market_offsets: HashMap<MarketType, f64>,
}

#[derive(Debug, Clone)]
pub struct LogisticModel {
    artifact: LogisticArtifact,
}

impl LogisticModel {
    /// Validate an artifact and wrap it as a model.
    pub fn from_artifact(artifact: LogisticArtifact) -> Result<Self> {
        if artifact.version.trim().is_empty() {
            bail!("model artifact has an empty version");
        }
        if !artifact.intercept.is_finite() {
            bail!("model intercept is not finite");
        }
        for (name, weight) in &artifact.weights {
            if !FEATURE_NAMES.contains(&name.as_str()) {
                bail!("unknown feature in model weights: {name}");
            }
            if !weight.is_finite() {
                bail!("weight for {name} is not finite");
            }
        }
        Ok(Self { artifact })
    }

    /// Read and validate an artifact file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact: LogisticArtifact = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Self::from_artifact(artifact)
    }

    fn logit(&self, features: &PlayerFeatureVector) -> Result<f64> {
        let offset = self
            .artifact
            .market_offsets
            .get(&features.market.market_type)
            .copied()
            .unwrap_or(0.0);
        let mut z = self.artifact.intercept + offset;
        for (name, weight) in &self.artifact.weights {
            let value = features
                .features
                .get(name)
                .ok_or_else(|| anyhow!("feature {name} missing from vector"))?;
            z += weight * value;
        }
        Ok(z)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ProbabilityModel for LogisticModel {
    fn predict(&self, features: &PlayerFeatureVector) -> Result<f64> {
        let z = self.logit(features)?;
        let p = sigmoid(z);
        if !p.is_finite() {
            bail!("logit {z} produced a non-finite probability");
        }
        Ok(p)
    }

    fn model_version(&self) -> &str {
        &self.artifact.version
    }
}
