//! Historical data sources.
//!
//! Defines the `HistorySource` trait the orchestrator pulls game logs and
//! matchup context through, plus the retry wrapper every call goes via.

pub mod retry;
pub mod snapshot;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{MarketType, MatchupContext, PlayerHistory};

pub use retry::RetryPolicy;
pub use snapshot::{SlateSnapshot, SnapshotSource};

/// Abstraction over player history and matchup context lookups.
///
/// Implementations may hit the network or disk; the orchestrator wraps
/// every call in a timeout with bounded retries.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Season-to-date game logs for a player, most recent first.
    /// An unknown player yields an empty history, not an error.
    async fn get_history(&self, player_id: &str, market_type: MarketType) -> Result<PlayerHistory>;

    /// Team context for the player's next game against `opponent`.
    /// `None` when no context is published.
    async fn get_context(&self, player_id: &str, opponent: &str) -> Result<Option<MatchupContext>>;
}
