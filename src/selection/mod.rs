//! Selection and ranking.
//!
//! Filters scored props against configured thresholds, collapses
//! duplicate market keys, orders the survivors deterministically and
//! truncates to `top_k`. Every excluded item is kept with its reason.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::scoring::ScoredProp;
use crate::types::MarketKey;

/// Thresholds applied by [`select`].
#[derive(Debug, Clone, Copy)]
pub struct SelectionConfig {
    pub min_confidence: u8,
    pub min_edge: f64,
    pub top_k: usize,
}

impl From<&PipelineConfig> for SelectionConfig {
    fn from(p: &PipelineConfig) -> Self {
        Self {
            min_confidence: p.min_confidence,
            min_edge: p.min_edge,
            top_k: p.top_k,
        }
    }
}

/// Why an item did not make the final selection. Not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    BelowThreshold { confidence_score: u8, edge: f64 },
    /// Another quote for the same key had the larger edge.
    Duplicate { kept_edge: f64 },
    /// Qualified, but ranked past `top_k`. `rank` is 1-based.
    Truncated { rank: usize },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::BelowThreshold {
                confidence_score,
                edge,
            } => write!(
                f,
                "below threshold (conf={confidence_score}, edge={:+.1}%)",
                edge * 100.0
            ),
            DropReason::Duplicate { kept_edge } => {
                write!(f, "duplicate (kept edge {:+.1}%)", kept_edge * 100.0)
            }
            DropReason::Truncated { rank } => write!(f, "truncated (rank {rank})"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DroppedItem {
    pub key: MarketKey,
    pub player_name: String,
    pub line: f64,
    #[serde(flatten)]
    pub reason: DropReason,
}

impl DroppedItem {
    fn new(prop: &ScoredProp, reason: DropReason) -> Self {
        Self {
            key: prop.key(),
            player_name: prop.market.player_name.clone(),
            line: prop.market.line,
            reason,
        }
    }
}

/// Ordered candidates plus everything that was excluded on the way.
#[derive(Debug, Clone, Default)]
pub struct RankedSelection {
    pub ranked: Vec<ScoredProp>,
    pub dropped: Vec<DroppedItem>,
}

impl RankedSelection {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// Number of drops matching a predicate, e.g. all truncations.
    pub fn dropped_count(&self, pred: impl Fn(&DropReason) -> bool) -> usize {
        self.dropped.iter().filter(|d| pred(&d.reason)).count()
    }
}

/// Total ranking order: edge desc, confidence desc, player name asc.
///
/// The remaining keys only separate items that tie on all three, so the
/// output never depends on input order.
pub fn rank_order(a: &ScoredProp, b: &ScoredProp) -> Ordering {
    b.edge
        .total_cmp(&a.edge)
        .then_with(|| b.confidence_score.cmp(&a.confidence_score))
        .then_with(|| a.market.player_name.cmp(&b.market.player_name))
        .then_with(|| a.market.player_id.cmp(&b.market.player_id))
        .then_with(|| a.market.market_type.cmp(&b.market.market_type))
        .then_with(|| a.market.book.cmp(&b.market.book))
        .then_with(|| a.market.line.total_cmp(&b.market.line))
}

/// True when `challenger` should replace `incumbent` for the same key.
fn beats(challenger: &ScoredProp, incumbent: &ScoredProp) -> bool {
    match challenger.abs_edge().total_cmp(&incumbent.abs_edge()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => challenger.confidence_score > incumbent.confidence_score,
    }
}

/// Filter, deduplicate, order and truncate.
pub fn select(scored: Vec<ScoredProp>, config: &SelectionConfig) -> RankedSelection {
    let mut dropped = Vec::new();

    // Thresholds
    let mut qualifying = Vec::with_capacity(scored.len());
    for prop in scored {
        if prop.confidence_score < config.min_confidence || prop.abs_edge() < config.min_edge {
            let reason = DropReason::BelowThreshold {
                confidence_score: prop.confidence_score,
                edge: prop.edge,
            };
            dropped.push(DroppedItem::new(&prop, reason));
        } else {
            qualifying.push(prop);
        }
    }

    // Dedup by key, first-seen wins exact ties
    let mut slots: HashMap<MarketKey, usize> = HashMap::new();
    let mut survivors: Vec<ScoredProp> = Vec::with_capacity(qualifying.len());
    let mut losers = Vec::new();
    for prop in qualifying {
        match slots.get(&prop.key()) {
            Some(&slot) if beats(&prop, &survivors[slot]) => {
                losers.push(std::mem::replace(&mut survivors[slot], prop));
            }
            Some(_) => losers.push(prop),
            None => {
                slots.insert(prop.key(), survivors.len());
                survivors.push(prop);
            }
        }
    }
    for loser in losers {
        let kept_edge = slots
            .get(&loser.key())
            .map(|&slot| survivors[slot].edge)
            .unwrap_or(loser.edge);
        dropped.push(DroppedItem::new(&loser, DropReason::Duplicate { kept_edge }));
    }

    // Order and truncate
    survivors.sort_by(rank_order);
    if survivors.len() > config.top_k {
        for (i, prop) in survivors.iter().enumerate().skip(config.top_k) {
            dropped.push(DroppedItem::new(prop, DropReason::Truncated { rank: i + 1 }));
        }
        survivors.truncate(config.top_k);
    }

    debug!(
        ranked = survivors.len(),
        dropped = dropped.len(),
        top_k = config.top_k,
        "Selection complete"
    );

    RankedSelection {
        ranked: survivors,
        dropped,
    }
}
