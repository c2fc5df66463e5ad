//! Stat-distribution model.
//!
//! Treats the matchup projection as the mean of the player's stat line and
//! reads the probability of clearing the line off a distribution chosen by
//! stat category:
//!
//! - points: Normal
//! - rebounds / assists: Negative Binomial when over-dispersed, else Poisson
//! - threes made: Poisson
//!
//! Tail probabilities are computed exactly, so the model is deterministic.

use anyhow::{anyhow, Result};
use statrs::distribution::{ContinuousCDF, DiscreteCDF, NegativeBinomial, Normal, Poisson};

use super::ProbabilityModel;
use crate::features::PlayerFeatureVector;
use crate::types::MarketType;

/// Model output is kept away from certainty.
const PROB_FLOOR: f64 = 0.001;
const PROB_CEIL: f64 = 0.999;

#[derive(Debug, Clone)]
pub struct DistributionModel {
    version: String,
}

impl DistributionModel {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// Mean and variance of the stat after matchup adjustment.
    ///
    /// The variance is scaled by the same ratio the projection moved the
    /// rolling mean.
    fn adjusted_moments(features: &PlayerFeatureVector) -> (f64, f64) {
        let f = &features.features;
        let mean = f.projection.max(0.0);
        let scale = if f.rolling_mean > 0.0 {
            mean / f.rolling_mean
        } else {
            1.0
        };
        (mean, f.rolling_variance * scale)
    }

    /// P(X > line) for the category's distribution.
    pub fn over_probability(
        market_type: MarketType,
        mean: f64,
        variance: f64,
        line: f64,
    ) -> Result<f64> {
        if !mean.is_finite() || !variance.is_finite() || !line.is_finite() {
            return Err(anyhow!("non-finite inputs: mean={mean} var={variance} line={line}"));
        }
        if mean <= 0.0 {
            // A player projected for nothing only goes over a negative line.
            return Ok(if line < 0.0 { 1.0 } else { 0.0 });
        }

        match market_type {
            MarketType::Points => {
                let std_dev = if variance > 0.0 {
                    variance.sqrt()
                } else {
                    mean.sqrt()
                };
                let normal = Normal::new(mean, std_dev).map_err(|e| anyhow!("normal: {e}"))?;
                Ok(1.0 - normal.cdf(line))
            }
            MarketType::Rebounds | MarketType::Assists => {
                let var = if variance > 0.0 { variance } else { mean + 1.0 };
                if var > mean {
                    let p = mean / var;
                    let r = mean * mean / (var - mean);
                    let nb = NegativeBinomial::new(r, p).map_err(|e| anyhow!("negbin: {e}"))?;
                    Ok(discrete_over(|k| nb.cdf(k), line))
                } else {
                    poisson_over(mean, line)
                }
            }
            MarketType::ThreesMade => poisson_over(mean, line),
        }
    }
}

fn poisson_over(mean: f64, line: f64) -> Result<f64> {
    let poisson = Poisson::new(mean).map_err(|e| anyhow!("poisson: {e}"))?;
    Ok(discrete_over(|k| poisson.cdf(k), line))
}

/// P(X > line) for a count distribution given its CDF.
fn discrete_over(cdf: impl Fn(u64) -> f64, line: f64) -> f64 {
    if line < 0.0 {
        return 1.0;
    }
    1.0 - cdf(line.floor() as u64)
}

impl ProbabilityModel for DistributionModel {
    fn predict(&self, features: &PlayerFeatureVector) -> Result<f64> {
        let (mean, variance) = Self::adjusted_moments(features);
        let p = Self::over_probability(
            features.market.market_type,
            mean,
            variance,
            features.features.line,
        )?;
        Ok(p.clamp(PROB_FLOOR, PROB_CEIL))
    }

    fn model_version(&self) -> &str {
        &self.version
    }
}
