//! Scoring engine.
//!
//! Invokes the probability model on a feature vector and derives the
//! confidence score, edge and lean from the result.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::features::{odds, PlayerFeatureVector};
use crate::model::ProbabilityModel;
use crate::types::{DataQuality, MarketKey, PropError, PropMarket, Side};

/// A market with its model probability and derived signals.
#[derive(Debug, Clone)]
pub struct ScoredProp {
    pub market: Arc<PropMarket>,
    /// Probability the over resolves true.
    pub model_probability: f64,
    /// No-vig market probability of the over.
    pub implied_probability: f64,
    pub confidence_score: u8,
    /// `model_probability - implied_probability`; positive favours the over.
    pub edge: f64,
    pub side: Side,
    /// Expected profit per unit staked on `side` at the quoted price.
    pub ev_per_unit: f64,
    pub data_quality: DataQuality,
    pub model_version: String,
}

impl ScoredProp {
    pub fn key(&self) -> MarketKey {
        self.market.key()
    }

    pub fn abs_edge(&self) -> f64 {
        self.edge.abs()
    }
}

impl fmt::Display for ScoredProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:.1} | model={:.1}% mkt={:.1}% edge={:+.1}% | conf={} [{}]",
            self.market.player_name,
            self.market.market_type,
            self.side,
            self.market.line,
            self.model_probability * 100.0,
            self.implied_probability * 100.0,
            self.edge * 100.0,
            self.confidence_score,
            self.market.book,
        )
    }
}

/// Confidence in [0, 100] from distance to maximal uncertainty.
///
/// `round(200 * |p - 0.5|)`, clipped. Any probability other than exactly
/// 0.5 scores at least 1, so a score of 0 means a coin flip and nothing
/// else.
pub fn confidence_score(p: f64) -> u8 {
    let distance = (p - 0.5).abs();
    if distance == 0.0 || !distance.is_finite() {
        return 0;
    }
    (200.0 * distance).round().clamp(1.0, 100.0) as u8
}

/// Score one feature vector with the given model.
pub fn score(
    features: &PlayerFeatureVector,
    model: &dyn ProbabilityModel,
) -> Result<ScoredProp, PropError> {
    let model_error = |message: String| PropError::Model {
        model_version: model.model_version().to_string(),
        message,
    };

    let p = model
        .predict(features)
        .map_err(|e| model_error(format!("{e:#}")))?;
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(model_error(format!("probability {p} outside [0, 1]")));
    }

    let market = &features.market;
    let implied = features.implied_probability();
    let edge = p - implied;
    let side = Side::from_edge(edge);
    let (price, win_prob) = match side {
        Side::Over => (market.over_price, p),
        Side::Under => (market.under_price, 1.0 - p),
    };
    let ev_per_unit = odds::expected_value_per_unit(price, win_prob)?;
    let confidence = confidence_score(p);

    debug!(
        player = %market.player_name,
        market_type = %market.market_type,
        model_prob = format!("{:.1}%", p * 100.0),
        implied = format!("{:.1}%", implied * 100.0),
        edge = format!("{:+.1}%", edge * 100.0),
        confidence,
        "Prop scored"
    );

    Ok(ScoredProp {
        market: Arc::clone(market),
        model_probability: p,
        implied_probability: implied,
        confidence_score: confidence,
        edge,
        side,
        ev_per_unit,
        data_quality: features.data_quality,
        model_version: model.model_version().to_string(),
    })
}
