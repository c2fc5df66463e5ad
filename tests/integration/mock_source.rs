//! Test doubles for pipeline integration tests.
//!
//! `ScriptedSource` is a deterministic in-memory `HistorySource` whose
//! failures and latency are controllable from test code. `MockSource` is
//! the mockall-generated double for call-count expectations.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use mockall::mock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use propedge::config::{AppConfig, DataConfig, PipelineConfig};
use propedge::data::HistorySource;
use propedge::features::PlayerFeatureVector;
use propedge::model::ProbabilityModel;
use propedge::types::*;

pub const MODEL_VERSION: &str = "test-v1";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn market(player_id: &str, name: &str, market_type: MarketType, line: f64) -> PropMarket {
    PropMarket {
        player_id: player_id.to_string(),
        player_name: name.to_string(),
        team: "Home".to_string(),
        opponent: "Away".to_string(),
        market_type,
        line,
        over_price: Price::American(-110.0),
        under_price: Price::American(-110.0),
        book: "draftkings".to_string(),
        timestamp: Utc.with_ymd_and_hms(2025, 12, 28, 17, 0, 0).unwrap(),
    }
}

/// `n` games alternating `mean ± 3` in every stat, most recent first.
pub fn history(player_id: &str, mean: f64, n: u32) -> PlayerHistory {
    PlayerHistory {
        player_id: player_id.to_string(),
        games: (0..n)
            .map(|i| {
                let swing = if i % 2 == 0 { 3.0 } else { -3.0 };
                GameLog {
                    game_date: NaiveDate::from_ymd_opt(2025, 12, 27).unwrap()
                        - chrono::Duration::days(2 * i as i64),
                    minutes: 34.0,
                    points: mean + swing,
                    rebounds: (mean / 3.0 + swing / 3.0).max(0.0),
                    assists: (mean / 4.0 + swing / 4.0).max(0.0),
                    threes_made: 2.0,
                }
            })
            .collect(),
    }
}

pub fn context(opponent: &str) -> MatchupContext {
    MatchupContext {
        opponent: opponent.to_string(),
        team_pace: Some(99.5),
        opponent_pace: Some(99.5),
        opponent_def_rating: Some(114.0),
        ..Default::default()
    }
}

/// Permissive thresholds, fast retries.
pub fn config(concurrency: usize) -> AppConfig {
    let mut cfg = AppConfig::with_pipeline(PipelineConfig {
        window_size: 10,
        min_confidence: 0,
        min_edge: 0.0,
        top_k: 20,
        concurrency,
        model_version: MODEL_VERSION.to_string(),
    });
    cfg.data = DataConfig {
        timeout_ms: 200,
        max_attempts: 2,
        backoff_ms: 1,
    };
    cfg
}

// ---------------------------------------------------------------------------
// Scripted source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedSource {
    histories: HashMap<String, PlayerHistory>,
    contexts: HashMap<String, MatchupContext>,
    failing: HashSet<String>,
    failing_context: bool,
    delay: Option<Duration>,
    pub history_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, history: PlayerHistory) -> Self {
        self.histories.insert(history.player_id.clone(), history);
        self
    }

    pub fn with_context(mut self, player_id: &str, ctx: MatchupContext) -> Self {
        self.contexts.insert(player_id.to_string(), ctx);
        self
    }

    /// History lookups for this player always error.
    pub fn failing_for(mut self, player_id: &str) -> Self {
        self.failing.insert(player_id.to_string());
        self
    }

    /// Every context lookup errors.
    pub fn failing_context(mut self) -> Self {
        self.failing_context = true;
        self
    }

    /// Sleep before answering each history lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl HistorySource for ScriptedSource {
    async fn get_history(&self, player_id: &str, _market_type: MarketType) -> Result<PlayerHistory> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(player_id) {
            return Err(anyhow!("stats service returned 503 for {player_id}"));
        }
        Ok(self.histories.get(player_id).cloned().unwrap_or_default())
    }

    async fn get_context(&self, player_id: &str, _opponent: &str) -> Result<Option<MatchupContext>> {
        if self.failing_context {
            return Err(anyhow!("context feed unavailable"));
        }
        Ok(self.contexts.get(player_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// mockall double
// ---------------------------------------------------------------------------

mock! {
    pub Source {}

    #[async_trait]
    impl HistorySource for Source {
        async fn get_history(&self, player_id: &str, market_type: MarketType) -> Result<PlayerHistory>;
        async fn get_context(&self, player_id: &str, opponent: &str) -> Result<Option<MatchupContext>>;
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Returns a fixed probability per player, erroring for unknown players.
pub struct TableModel {
    probabilities: HashMap<String, f64>,
    concurrent_safe: bool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    hold: Duration,
}

impl TableModel {
    pub fn new(entries: &[(&str, f64)]) -> Self {
        Self {
            probabilities: entries.iter().map(|(k, p)| (k.to_string(), *p)).collect(),
            concurrent_safe: true,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            hold: Duration::ZERO,
        }
    }

    /// Mark as unsafe for concurrent use and hold each call for `hold`.
    pub fn single_threaded(mut self, hold: Duration) -> Self {
        self.concurrent_safe = false;
        self.hold = hold;
        self
    }
}

impl ProbabilityModel for TableModel {
    fn predict(&self, features: &PlayerFeatureVector) -> Result<f64> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.hold.is_zero() {
            std::thread::sleep(self.hold);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.probabilities
            .get(&features.market.player_id)
            .copied()
            .ok_or_else(|| anyhow!("no coefficients for player {}", features.market.player_id))
    }

    fn model_version(&self) -> &str {
        MODEL_VERSION
    }

    fn is_concurrent_safe(&self) -> bool {
        self.concurrent_safe
    }
}

