//! Slate snapshot: a JSON file carrying the day's markets together with
//! the game logs and matchup context needed to score them.
//!
//! ```json
//! {
//!   "markets":   [ { "player_id": "...", "market_type": "points", ... } ],
//!   "histories": [ { "player_id": "...", "games": [ ... ] } ],
//!   "contexts":  [ { "player_id": "...", "context": { "opponent": "...", ... } } ]
//! }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::HistorySource;
use crate::types::{MarketType, MatchupContext, PlayerHistory, PropMarket};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerContext {
    pub player_id: String,
    pub context: MatchupContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlateSnapshot {
    pub markets: Vec<PropMarket>,
    #[serde(default)]
    pub histories: Vec<PlayerHistory>,
    #[serde(default)]
    pub contexts: Vec<PlayerContext>,
}

impl SlateSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read slate file: {}", path.display()))?;
        let snapshot: SlateSnapshot = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse slate file: {}", path.display()))?;
        info!(
            markets = snapshot.markets.len(),
            players = snapshot.histories.len(),
            contexts = snapshot.contexts.len(),
            "Slate loaded"
        );
        Ok(snapshot)
    }

    /// Split into the market list and a source serving the rest.
    pub fn into_parts(self) -> (Vec<PropMarket>, SnapshotSource) {
        let source = SnapshotSource::new(self.histories, self.contexts);
        (self.markets, source)
    }
}

/// In-memory `HistorySource` backed by a loaded snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    histories: HashMap<String, PlayerHistory>,
    contexts: HashMap<String, MatchupContext>,
}

impl SnapshotSource {
    pub fn new(histories: Vec<PlayerHistory>, contexts: Vec<PlayerContext>) -> Self {
        Self {
            histories: histories
                .into_iter()
                .map(|h| (h.player_id.clone(), h))
                .collect(),
            contexts: contexts
                .into_iter()
                .map(|c| (c.player_id, c.context))
                .collect(),
        }
    }
}

#[async_trait]
impl HistorySource for SnapshotSource {
    async fn get_history(&self, player_id: &str, _market_type: MarketType) -> Result<PlayerHistory> {
        Ok(self.histories.get(player_id).cloned().unwrap_or_else(|| PlayerHistory {
            player_id: player_id.to_string(),
            games: Vec::new(),
        }))
    }

    async fn get_context(&self, player_id: &str, opponent: &str) -> Result<Option<MatchupContext>> {
        // A context recorded against a different opponent is stale.
        Ok(self
            .contexts
            .get(player_id)
            .filter(|c| c.opponent.is_empty() || c.opponent.eq_ignore_ascii_case(opponent))
            .cloned())
    }
}
