//! Shared types for the PROPEDGE pipeline.
//!
//! These types form the data model passed between the feature builder,
//! scoring engine, selection layer and orchestrator. Everything here is
//! created fresh per run and treated as read-only once built.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::engine::ItemFailure;

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// Stat category a prop is written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Points,
    Rebounds,
    Assists,
    ThreesMade,
}

impl MarketType {
    /// All known categories (useful for iteration).
    pub const ALL: &'static [MarketType] = &[
        MarketType::Points,
        MarketType::Rebounds,
        MarketType::Assists,
        MarketType::ThreesMade,
    ];

    /// Stable lowercase identifier, used in keys and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Points => "points",
            MarketType::Rebounds => "rebounds",
            MarketType::Assists => "assists",
            MarketType::ThreesMade => "threes_made",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A quoted price for one side of a prop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Price {
    /// American odds, e.g. -110 or +125.
    American(f64),
    /// Decimal odds, e.g. 1.91.
    Decimal(f64),
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::American(odds) if *odds > 0.0 => write!(f, "+{odds:.0}"),
            Price::American(odds) => write!(f, "{odds:.0}"),
            Price::Decimal(odds) => write!(f, "{odds:.2}"),
        }
    }
}

/// A canonical player-prop quote as supplied by the market normaliser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropMarket {
    pub player_id: String,
    pub player_name: String,
    pub team: String,
    pub opponent: String,
    pub market_type: MarketType,
    /// Threshold the stat must exceed for "over" to win.
    pub line: f64,
    pub over_price: Price,
    pub under_price: Price,
    pub book: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for PropMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {:.1} (o{} / u{}) vs {}",
            self.book,
            self.player_name,
            self.market_type,
            self.line,
            self.over_price,
            self.under_price,
            self.opponent,
        )
    }
}

impl PropMarket {
    /// Identity used for deduplication and error reporting.
    pub fn key(&self) -> MarketKey {
        MarketKey {
            player_id: self.player_id.clone(),
            market_type: self.market_type,
            book: self.book.clone(),
        }
    }

    /// Helper to build a test/sample market with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        PropMarket {
            player_id: "1628983".to_string(),
            player_name: "Shai Gilgeous-Alexander".to_string(),
            team: "Oklahoma City Thunder".to_string(),
            opponent: "Denver Nuggets".to_string(),
            market_type: MarketType::Points,
            line: 30.5,
            over_price: Price::American(-115.0),
            under_price: Price::American(-105.0),
            book: "draftkings".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// `(player_id, market_type, book)`: unique within a ranked selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    pub player_id: String,
    pub market_type: MarketType,
    pub book: String,
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.player_id, self.market_type, self.book)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which side of the line a scored prop leans towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Over,
    Under,
}

impl Side {
    /// Side implied by a signed edge. Zero edge is reported as over.
    pub fn from_edge(edge: f64) -> Self {
        if edge < 0.0 {
            Side::Under
        } else {
            Side::Over
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Side::Over => "over",
            Side::Under => "under",
        })
    }
}

/// How much real history backs a feature vector. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// A full rolling window of games and real opponent context.
    Full,
    /// Fewer games than the window; season-to-date averages used.
    Partial,
    /// Opponent context missing; league averages substituted.
    Fallback,
}

impl DataQuality {
    /// Combine two quality flags, keeping the worse one.
    pub fn worst(self, other: DataQuality) -> DataQuality {
        self.max(other)
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            DataQuality::Full => "full",
            DataQuality::Partial => "partial",
            DataQuality::Fallback => "fallback",
        })
    }
}

// ---------------------------------------------------------------------------
// Historical data
// ---------------------------------------------------------------------------

/// One completed game's box-score line for a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameLog {
    pub game_date: NaiveDate,
    pub minutes: f64,
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub threes_made: f64,
}

impl GameLog {
    /// The stat this game contributes to a given market.
    pub fn stat(&self, market_type: MarketType) -> f64 {
        match market_type {
            MarketType::Points => self.points,
            MarketType::Rebounds => self.rebounds,
            MarketType::Assists => self.assists,
            MarketType::ThreesMade => self.threes_made,
        }
    }
}

/// Season-to-date game logs for a player, most recent first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerHistory {
    pub player_id: String,
    #[serde(default)]
    pub games: Vec<GameLog>,
}

impl PlayerHistory {
    /// Games the player actually appeared in (DNPs excluded).
    pub fn usable_games(&self, min_minutes: f64) -> Vec<&GameLog> {
        self.games
            .iter()
            .filter(|g| g.minutes >= min_minutes && g.minutes.is_finite())
            .collect()
    }
}

/// Team-level context for a player's upcoming game.
///
/// Any field may be missing; the feature builder substitutes league
/// averages for whatever is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchupContext {
    pub opponent: String,
    /// Possessions per 48 minutes for the player's team.
    #[serde(default)]
    pub team_pace: Option<f64>,
    #[serde(default)]
    pub opponent_pace: Option<f64>,
    /// Opponent points allowed per 100 possessions.
    #[serde(default)]
    pub opponent_def_rating: Option<f64>,
    /// Opponent defensive rating against a specific stat category, on the
    /// same scale as `opponent_def_rating`. Takes precedence when present.
    #[serde(default)]
    pub stat_def_ratings: HashMap<MarketType, f64>,
    /// Expected minutes for the upcoming game, if a projection exists.
    #[serde(default)]
    pub projected_minutes: Option<f64>,
}

impl MatchupContext {
    /// Defensive rating to use for a stat category, if any is known.
    pub fn def_rating_for(&self, market_type: MarketType) -> Option<f64> {
        self.stat_def_ratings
            .get(&market_type)
            .copied()
            .or(self.opponent_def_rating)
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    /// True when the context says anything about the opponent. Team pace
    /// and projected minutes alone do not count.
    pub fn has_opponent_data(&self) -> bool {
        self.opponent_pace.is_some()
            || self.opponent_def_rating.is_some()
            || !self.stat_def_ratings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for PROPEDGE.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PropError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No usable history for player {player_id} ({market_type})")]
    MissingData {
        player_id: String,
        market_type: MarketType,
    },

    #[error("Model error ({model_version}): {message}")]
    Model {
        model_version: String,
        message: String,
    },

    #[error("Invalid odds: {0}")]
    InvalidOdds(String),

    #[error("Data source error ({source_name}): {message}")]
    DataSource {
        source_name: String,
        message: String,
    },

    #[error("Empty result: none of {attempted} markets produced a score")]
    EmptyResult {
        attempted: usize,
        /// Why each market failed, in input order.
        failures: Vec<ItemFailure>,
    },
}

impl PropError {
    /// Whether this error aborts the whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PropError::Config(_) | PropError::EmptyResult { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
