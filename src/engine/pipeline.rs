//! Pipeline orchestrator.
//!
//! Fans markets out over a bounded worker pool (history lookup → feature
//! build → scoring), waits for every worker at a barrier, then hands the
//! complete candidate pool to selection. One market failing never stops
//! the others; failures are collected into the run's `ErrorReport`.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::report::{ErrorReport, ItemFailure};
use crate::config::AppConfig;
use crate::data::{HistorySource, RetryPolicy};
use crate::features::FeatureBuilder;
use crate::model::ProbabilityModel;
use crate::scoring::{self, ScoredProp};
use crate::selection::{self, RankedSelection, SelectionConfig};
use crate::types::{PropError, PropMarket};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub selection: RankedSelection,
    pub report: ErrorReport,
}

// ---------------------------------------------------------------------------
// Per-item stages
// ---------------------------------------------------------------------------

/// Shared, read-only state handed to every worker.
struct Stages {
    builder: FeatureBuilder,
    source: Arc<dyn HistorySource>,
    model: Arc<dyn ProbabilityModel>,
    /// Present when the model must not be called concurrently.
    model_gate: Option<Mutex<()>>,
    retry: RetryPolicy,
}

impl Stages {
    async fn process(&self, market: Arc<PropMarket>) -> Result<ScoredProp, PropError> {
        let source = &self.source;
        let player_id = market.player_id.as_str();
        let opponent = market.opponent.as_str();
        let market_type = market.market_type;

        let history = self
            .retry
            .run("history", move || source.get_history(player_id, market_type))
            .await?;

        // Missing context degrades quality; it is not an item failure.
        let context = match self
            .retry
            .run("context", move || source.get_context(player_id, opponent))
            .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(player = %market.player_name, error = %e, "Context unavailable, using league averages");
                None
            }
        };

        let features = self
            .builder
            .build(Arc::clone(&market), &history, context.as_ref())?;

        match &self.model_gate {
            Some(gate) => {
                let _guard = gate.lock().await;
                scoring::score(&features, self.model.as_ref())
            }
            None => scoring::score(&features, self.model.as_ref()),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: Arc<AppConfig>,
    stages: Arc<Stages>,
}

impl Pipeline {
    /// Validate configuration and wire the stages together.
    pub fn new(
        config: Arc<AppConfig>,
        source: Arc<dyn HistorySource>,
        model: Arc<dyn ProbabilityModel>,
    ) -> Result<Self, PropError> {
        config.validate()?;

        if model.model_version() != config.pipeline.model_version {
            return Err(PropError::Config(format!(
                "loaded model {} does not match pipeline.model_version {}",
                model.model_version(),
                config.pipeline.model_version
            )));
        }

        let model_gate = if model.is_concurrent_safe() {
            None
        } else {
            info!(model_version = model.model_version(), "Model calls will be serialised");
            Some(Mutex::new(()))
        };

        let stages = Stages {
            builder: FeatureBuilder::new(&config.pipeline, config.features.clone()),
            source,
            model,
            model_gate,
            retry: RetryPolicy::from(&config.data),
        };

        Ok(Self {
            config,
            stages: Arc::new(stages),
        })
    }

    /// Score and rank a batch of markets.
    ///
    /// Cancelling `cancel` stops scheduling new markets; those already
    /// running finish and the run is reported as partial. Fails with
    /// `EmptyResult` only when a complete run scored nothing.
    pub async fn run(
        &self,
        markets: Vec<PropMarket>,
        cancel: CancellationToken,
    ) -> Result<PipelineOutput, PropError> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let attempted = markets.len();
        let pipeline = &self.config.pipeline;

        info!(
            run_id = %run_id,
            markets = attempted,
            concurrency = pipeline.concurrency,
            model_version = %pipeline.model_version,
            window_size = pipeline.window_size,
            "Pipeline run starting"
        );

        // Fan out
        let semaphore = Arc::new(Semaphore::new(pipeline.concurrency));
        let mut tasks = JoinSet::new();
        let mut scheduled: Vec<Arc<PropMarket>> = Vec::with_capacity(attempted);

        for (index, market) in markets.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                warn!(run_id = %run_id, scheduled = index, "Cancellation received, no further markets scheduled");
                break;
            };

            let market = Arc::new(market);
            scheduled.push(Arc::clone(&market));
            let stages = Arc::clone(&self.stages);
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = stages.process(market).await;
                (index, outcome)
            });
        }
        let skipped = attempted - scheduled.len();
        let partial = skipped > 0;

        // Barrier: every scheduled worker reports before ranking
        let mut outcomes: Vec<Option<Result<ScoredProp, PropError>>> =
            (0..scheduled.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => error!(run_id = %run_id, error = %e, "Worker task failed"),
            }
        }

        // Input order
        let mut scored = Vec::new();
        let mut failures = Vec::new();
        for (market, outcome) in scheduled.iter().zip(outcomes) {
            match outcome {
                Some(Ok(prop)) => scored.push(prop),
                Some(Err(e)) => {
                    warn!(run_id = %run_id, key = %market.key(), error = %e, "Market failed");
                    failures.push(ItemFailure::new(market, &e));
                }
                None => failures.push(ItemFailure::internal(market, "worker task did not complete")),
            }
        }

        let report = ErrorReport {
            run_id: run_id.clone(),
            model_version: pipeline.model_version.clone(),
            attempted,
            succeeded: scored.len(),
            failures,
            skipped,
            partial,
        };

        if report.succeeded == 0 && !partial {
            error!(run_id = %run_id, attempted, failed = report.failed(), "No market produced a score");
            return Err(PropError::EmptyResult {
                attempted,
                failures: report.failures,
            });
        }

        let selection = selection::select(scored, &SelectionConfig::from(pipeline));

        info!(
            run_id = %run_id,
            attempted,
            succeeded = report.succeeded,
            failed = report.failed(),
            skipped,
            partial,
            ranked = selection.len(),
            dropped = selection.dropped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );

        Ok(PipelineOutput { selection, report })
    }
}

/// One-shot entry point: build a pipeline and run it to completion.
pub async fn run_pipeline(
    markets: Vec<PropMarket>,
    config: &AppConfig,
    source: Arc<dyn HistorySource>,
    model: Arc<dyn ProbabilityModel>,
) -> Result<PipelineOutput, PropError> {
    let pipeline = Pipeline::new(Arc::new(config.clone()), source, model)?;
    pipeline.run(markets, CancellationToken::new()).await
}
