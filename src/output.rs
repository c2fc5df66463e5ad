//! Rendering a finished run for people and for downstream tools.

use serde::Serialize;
use std::fmt::Write as _;

use crate::engine::{ErrorReport, PipelineOutput};
use crate::scoring::ScoredProp;
use crate::selection::DroppedItem;
use crate::types::{DataQuality, MarketType, Side};

/// The per-candidate record handed downstream.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord {
    pub rank: usize,
    pub player_name: String,
    pub market_type: MarketType,
    pub line: f64,
    pub side: Side,
    pub model_probability: f64,
    pub confidence_score: u8,
    pub edge: f64,
    /// Expected profit per unit staked on `side`.
    pub ev_per_unit: f64,
    pub book: String,
    pub data_quality: DataQuality,
}

impl OutputRecord {
    pub fn new(rank: usize, prop: &ScoredProp) -> Self {
        Self {
            rank,
            player_name: prop.market.player_name.clone(),
            market_type: prop.market.market_type,
            line: prop.market.line,
            side: prop.side,
            model_probability: prop.model_probability,
            confidence_score: prop.confidence_score,
            edge: prop.edge,
            ev_per_unit: prop.ev_per_unit,
            book: prop.market.book.clone(),
            data_quality: prop.data_quality,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunDocument<'a> {
    ranked: Vec<OutputRecord>,
    dropped: &'a [DroppedItem],
    report: &'a ErrorReport,
}

pub fn records(output: &PipelineOutput) -> Vec<OutputRecord> {
    output
        .selection
        .ranked
        .iter()
        .enumerate()
        .map(|(i, p)| OutputRecord::new(i + 1, p))
        .collect()
}

/// Pretty JSON: ranked records, drops and the error report.
pub fn render_json(output: &PipelineOutput) -> serde_json::Result<String> {
    let doc = RunDocument {
        ranked: records(output),
        dropped: &output.selection.dropped,
        report: &output.report,
    };
    serde_json::to_string_pretty(&doc)
}

/// Fixed-width table for the terminal.
pub fn render_text(output: &PipelineOutput) -> String {
    let mut out = String::new();
    let ranked = records(output);

    let _ = writeln!(
        out,
        "{:>3}  {:<26} {:<12} {:>6} {:<5} {:>7} {:>5} {:>7} {:>6}  {:<10} {}",
        "#", "PLAYER", "MARKET", "LINE", "SIDE", "MODEL", "CONF", "EDGE", "EV", "BOOK", "DATA"
    );
    for r in &ranked {
        let _ = writeln!(
            out,
            "{:>3}  {:<26} {:<12} {:>6.1} {:<5} {:>6.1}% {:>5} {:>+6.1}% {:>+6.2}  {:<10} {}",
            r.rank,
            truncate(&r.player_name, 26),
            r.market_type.as_str(),
            r.line,
            r.side,
            r.model_probability * 100.0,
            r.confidence_score,
            r.edge * 100.0,
            r.ev_per_unit,
            r.book,
            r.data_quality,
        );
    }
    if ranked.is_empty() {
        let _ = writeln!(out, "  (no candidates passed selection)");
    }

    if !output.selection.dropped.is_empty() {
        let _ = writeln!(out, "\nDropped ({}):", output.selection.dropped.len());
        for d in &output.selection.dropped {
            let _ = writeln!(out, "  {} {:.1} [{}]: {}", d.player_name, d.line, d.key, d.reason);
        }
    }

    let report = &output.report;
    if !report.failures.is_empty() {
        let _ = writeln!(out, "\nFailures ({}):", report.failures.len());
        for f in &report.failures {
            let _ = writeln!(out, "  {} [{}] {}: {}", f.player_name, f.key, f.kind, f.message);
        }
    }

    let _ = writeln!(out, "\n{report}");
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
