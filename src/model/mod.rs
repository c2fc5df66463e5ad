//! Probability models.
//!
//! Defines the `ProbabilityModel` capability the scoring engine calls and
//! the two fitted-model implementations that ship with the crate. The
//! scoring engine never knows which one it is talking to.

pub mod distribution;
pub mod logistic;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, ModelKind};
use crate::features::PlayerFeatureVector;
use crate::types::PropError;

pub use distribution::DistributionModel;
pub use logistic::LogisticModel;

/// Abstraction over pre-fit probability estimators.
///
/// Implementors map a feature vector to the probability that the over
/// resolves true. `predict` must be deterministic for a given
/// `model_version`: identical features always yield the identical value.
pub trait ProbabilityModel: Send + Sync {
    /// Probability of the over, in [0, 1].
    fn predict(&self, features: &PlayerFeatureVector) -> Result<f64>;

    /// Immutable identifier used for reproducibility logging.
    fn model_version(&self) -> &str;

    /// Whether `predict` may be called from several workers at once.
    /// When false the orchestrator serialises calls.
    fn is_concurrent_safe(&self) -> bool {
        true
    }
}

/// Load the model named in configuration.
///
/// The artifact's own version must match `pipeline.model_version`, so a
/// run's logs always identify the exact model that produced its numbers.
pub fn load_model(config: &AppConfig) -> Result<Arc<dyn ProbabilityModel>> {
    let version = config.pipeline.model_version.as_str();
    let model: Arc<dyn ProbabilityModel> = match config.model.kind {
        ModelKind::Distribution => Arc::new(DistributionModel::new(version)),
        ModelKind::Logistic => {
            let path = config.model.artifact_path.as_ref().ok_or_else(|| {
                PropError::Config("model.artifact_path is required for the logistic model".into())
            })?;
            let model = LogisticModel::load(path)
                .with_context(|| format!("Failed to load model artifact {}", path.display()))?;
            if model.model_version() != version {
                return Err(PropError::Config(format!(
                    "artifact version {} does not match pipeline.model_version {version}",
                    model.model_version()
                ))
                .into());
            }
            Arc::new(model)
        }
    };

    info!(
        kind = ?config.model.kind,
        model_version = model.model_version(),
        concurrent = model.is_concurrent_safe(),
        "Probability model loaded"
    );
    Ok(model)
}
