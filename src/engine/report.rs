//! Per-run failure accounting.

use serde::Serialize;
use std::fmt;

use crate::types::{MarketKey, PropError, PropMarket};

/// Category of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingData,
    Model,
    InvalidOdds,
    DataSource,
    /// Worker task panicked or an error surfaced that has no item meaning.
    Internal,
}

impl From<&PropError> for FailureKind {
    fn from(e: &PropError) -> Self {
        match e {
            PropError::MissingData { .. } => FailureKind::MissingData,
            PropError::Model { .. } => FailureKind::Model,
            PropError::InvalidOdds(_) => FailureKind::InvalidOdds,
            PropError::DataSource { .. } => FailureKind::DataSource,
            PropError::Config(_) | PropError::EmptyResult { .. } => FailureKind::Internal,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::MissingData => "missing_data",
            FailureKind::Model => "model",
            FailureKind::InvalidOdds => "invalid_odds",
            FailureKind::DataSource => "data_source",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// One market that produced no score.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub key: MarketKey,
    pub player_name: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(market: &PropMarket, error: &PropError) -> Self {
        Self {
            key: market.key(),
            player_name: market.player_name.clone(),
            kind: FailureKind::from(error),
            message: error.to_string(),
        }
    }

    pub fn internal(market: &PropMarket, message: impl Into<String>) -> Self {
        Self {
            key: market.key(),
            player_name: market.player_name.clone(),
            kind: FailureKind::Internal,
            message: message.into(),
        }
    }
}

/// Structured summary of what happened to every input market.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub run_id: String,
    pub model_version: String,
    pub attempted: usize,
    pub succeeded: usize,
    /// Failures in input order.
    pub failures: Vec<ItemFailure>,
    /// Markets never scheduled because the run was cancelled.
    pub skipped: usize,
    pub partial: bool,
}

impl ErrorReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {}: {}/{} scored, {} failed",
            self.run_id,
            self.succeeded,
            self.attempted,
            self.failed()
        )?;
        if self.partial {
            write!(f, ", {} skipped (cancelled)", self.skipped)?;
        }
        Ok(())
    }
}
