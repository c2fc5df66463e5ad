//! Feature builder.
//!
//! Converts a `PropMarket` plus the player's game logs and matchup
//! context into a fixed-schema `PlayerFeatureVector`. Pure: no I/O, no
//! shared state, safe to run on any number of workers at once.

pub mod odds;
pub mod rolling;

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::{FeatureConfig, PipelineConfig};
use crate::types::{DataQuality, MatchupContext, PlayerHistory, PropError, PropMarket};
use rolling::{head_mean, window_stats};

// ---------------------------------------------------------------------------
// Feature schema
// ---------------------------------------------------------------------------

/// Feature names, in schema order. Identical for every market type.
pub const FEATURE_NAMES: [&str; 14] = [
    "line",
    "rolling_mean",
    "rolling_variance",
    "recent_mean",
    "minutes_mean",
    "per_minute_rate",
    "projected_minutes",
    "pace_factor",
    "opp_def_rating",
    "defense_factor",
    "projection",
    "implied_over",
    "implied_under",
    "games_used",
];

/// Numeric features for one prop. Every field is always populated;
/// missing inputs resolve to fallback values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayerFeatures {
    pub line: f64,
    /// Mean of the stat over the rolling window (or season-to-date).
    pub rolling_mean: f64,
    pub rolling_variance: f64,
    /// Mean over the short recent-form window.
    pub recent_mean: f64,
    pub minutes_mean: f64,
    pub per_minute_rate: f64,
    pub projected_minutes: f64,
    pub pace_factor: f64,
    pub opp_def_rating: f64,
    /// Opponent rating relative to league average; below 1.0 is a
    /// tougher matchup.
    pub defense_factor: f64,
    /// Per-minute rate × projected minutes × pace × defense.
    pub projection: f64,
    /// No-vig probability of the over.
    pub implied_over: f64,
    pub implied_under: f64,
    pub games_used: f64,
}

impl PlayerFeatures {
    /// Values in `FEATURE_NAMES` order.
    pub fn values(&self) -> [f64; 14] {
        [
            self.line,
            self.rolling_mean,
            self.rolling_variance,
            self.recent_mean,
            self.minutes_mean,
            self.per_minute_rate,
            self.projected_minutes,
            self.pace_factor,
            self.opp_def_rating,
            self.defense_factor,
            self.projection,
            self.implied_over,
            self.implied_under,
            self.games_used,
        ]
    }

    /// `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.values())
    }

    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        self.iter().collect()
    }

    fn first_non_finite(&self) -> Option<&'static str> {
        self.iter().find(|(_, v)| !v.is_finite()).map(|(n, _)| n)
    }
}

/// Features for a single market, with a shared handle back to the quote
/// they were built from.
#[derive(Debug, Clone)]
pub struct PlayerFeatureVector {
    pub market: Arc<PropMarket>,
    pub features: PlayerFeatures,
    pub data_quality: DataQuality,
}

impl PlayerFeatureVector {
    /// Market-implied (no-vig) probability of the over.
    pub fn implied_probability(&self) -> f64 {
        self.features.implied_over
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds feature vectors with a fixed window and league baselines.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    window_size: usize,
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(pipeline: &PipelineConfig, config: FeatureConfig) -> Self {
        Self {
            window_size: pipeline.window_size,
            config,
        }
    }

    /// Build the feature vector for one market.
    ///
    /// With fewer than `window_size` usable games the season-to-date logs
    /// are used and quality drops to `Partial`. With no opponent context
    /// league averages are substituted and quality drops to `Fallback`.
    /// No usable games at all is a `MissingData` error.
    pub fn build(
        &self,
        market: Arc<PropMarket>,
        history: &PlayerHistory,
        context: Option<&MatchupContext>,
    ) -> Result<PlayerFeatureVector, PropError> {
        let market_type = market.market_type;
        if !market.line.is_finite() || market.line < 0.0 {
            return Err(PropError::InvalidOdds(format!(
                "line {} for {} is not a valid stat threshold",
                market.line,
                market.key()
            )));
        }
        let (implied_over, implied_under) = odds::no_vig(market.over_price, market.under_price)?;

        let missing = || PropError::MissingData {
            player_id: market.player_id.clone(),
            market_type,
        };

        // Most recent first; only games actually played with a finite stat.
        let games: Vec<_> = history
            .usable_games(self.config.min_minutes)
            .into_iter()
            .filter(|g| g.stat(market_type).is_finite())
            .collect();
        if games.is_empty() {
            return Err(missing());
        }

        let mut quality = DataQuality::Full;
        let take = if games.len() >= self.window_size {
            self.window_size
        } else {
            quality = DataQuality::Partial;
            games.len()
        };

        let stat_values: Vec<f64> = games.iter().map(|g| g.stat(market_type)).collect();
        let minute_values: Vec<f64> = games.iter().map(|g| g.minutes).collect();

        let window = window_stats(&stat_values[..take]).ok_or_else(missing)?;
        let minutes_mean = window_stats(&minute_values[..take]).ok_or_else(missing)?.mean;
        let recent_mean =
            head_mean(&stat_values, self.config.recent_window).unwrap_or(window.mean);

        let per_minute_rate = if minutes_mean > 0.0 {
            window.mean / minutes_mean
        } else {
            0.0
        };

        // Opponent context
        let league_pace = self.config.league_avg_pace;
        let league_def = self.config.league_avg_def_rating;
        if !context.is_some_and(MatchupContext::has_opponent_data) {
            quality = quality.worst(DataQuality::Fallback);
        }

        let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
        let team_pace = positive(context.and_then(|c| c.team_pace)).unwrap_or(league_pace);
        let opp_pace = positive(context.and_then(|c| c.opponent_pace)).unwrap_or(league_pace);
        let opp_def_rating = context
            .and_then(|c| c.def_rating_for(market_type))
            .unwrap_or(league_def);
        let projected_minutes =
            positive(context.and_then(|c| c.projected_minutes)).unwrap_or(minutes_mean);

        let pace_factor = (team_pace + opp_pace) / (2.0 * league_pace);
        let defense_factor = opp_def_rating / league_def;
        let projection = per_minute_rate * projected_minutes * pace_factor * defense_factor;

        let features = PlayerFeatures {
            line: market.line,
            rolling_mean: window.mean,
            rolling_variance: window.variance,
            recent_mean,
            minutes_mean,
            per_minute_rate,
            projected_minutes,
            pace_factor,
            opp_def_rating,
            defense_factor,
            projection,
            implied_over,
            implied_under,
            games_used: take as f64,
        };

        if let Some(name) = features.first_non_finite() {
            debug!(player = %market.player_name, feature = name, "Non-finite feature");
            return Err(missing());
        }

        debug!(
            player = %market.player_name,
            market_type = %market_type,
            games = take,
            quality = %quality,
            projection = format!("{projection:.2}"),
            line = market.line,
            implied_over = format!("{:.1}%", implied_over * 100.0),
            "Features built"
        );

        Ok(PlayerFeatureVector {
            market,
            features,
            data_quality: quality,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
