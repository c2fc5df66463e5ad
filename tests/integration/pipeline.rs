//! End-to-end pipeline runs against scripted and mocked sources.

use anyhow::anyhow;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use propedge::config::AppConfig;
use propedge::data::HistorySource;
use propedge::engine::{run_pipeline, FailureKind, Pipeline, PipelineOutput};
use propedge::model::{DistributionModel, ProbabilityModel};
use propedge::selection::DropReason;
use propedge::types::*;

use crate::mock_source::*;

async fn run(
    cfg: AppConfig,
    source: Arc<dyn HistorySource>,
    model: Arc<dyn ProbabilityModel>,
    markets: Vec<PropMarket>,
) -> Result<PipelineOutput, PropError> {
    run_pipeline(markets, &cfg, source, model).await
}

fn three_players() -> ScriptedSource {
    ScriptedSource::new()
        .with_history(history("a", 30.0, 12))
        .with_history(history("b", 22.0, 12))
        .with_history(history("c", 15.0, 12))
        .with_context("a", context("Away"))
        .with_context("b", context("Away"))
        .with_context("c", context("Away"))
}

fn three_markets() -> Vec<PropMarket> {
    vec![
        market("a", "Alpha", MarketType::Points, 27.5),
        market("b", "Bravo", MarketType::Points, 22.5),
        market("c", "Charlie", MarketType::Points, 17.5),
    ]
}

#[tokio::test]
async fn test_happy_path_ranks_by_signed_edge() {
    let model = Arc::new(TableModel::new(&[("a", 0.58), ("b", 0.66), ("c", 0.40)]));
    let out = assert_ok!(run(config(4), Arc::new(three_players()), model, three_markets()).await);

    assert_eq!(out.report.attempted, 3);
    assert_eq!(out.report.succeeded, 3);
    assert!(out.report.failures.is_empty());
    assert!(!out.report.partial);

    let names: Vec<_> = out
        .selection
        .ranked
        .iter()
        .map(|s| s.market.player_name.as_str())
        .collect();
    assert_eq!(names, vec!["Bravo", "Alpha", "Charlie"]);
    assert_eq!(out.selection.ranked[2].side, Side::Under);
    assert!(out
        .selection
        .ranked
        .iter()
        .all(|s| s.data_quality == DataQuality::Full));
}

#[tokio::test]
async fn test_missing_history_reported_while_others_succeed() {
    let source = ScriptedSource::new()
        .with_history(history("a", 30.0, 12))
        .with_history(history("c", 15.0, 12));
    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)]));
    let out = assert_ok!(run(config(4), Arc::new(source), model, three_markets()).await);

    assert_eq!(out.report.succeeded, 2);
    assert_eq!(out.report.failures.len(), 1);
    let failure = &out.report.failures[0];
    assert_eq!(failure.kind, FailureKind::MissingData);
    assert_eq!(failure.key.player_id, "b");
    assert_eq!(failure.key.market_type, MarketType::Points);
    assert_eq!(out.selection.len(), 2);
}

#[tokio::test]
async fn test_all_filtered_is_not_empty_result() {
    let mut cfg = config(4);
    cfg.pipeline.min_confidence = 100;
    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)]));
    let out = assert_ok!(run(cfg, Arc::new(three_players()), model, three_markets()).await);

    assert!(out.selection.is_empty());
    assert_eq!(out.report.succeeded, 3);
    assert_eq!(
        out.selection
            .dropped_count(|r| matches!(r, DropReason::BelowThreshold { .. })),
        3
    );
}

#[tokio::test]
async fn test_all_failed_is_empty_result() {
    let model = Arc::new(TableModel::new(&[]));
    let err = assert_err!(run(config(4), Arc::new(ScriptedSource::new()), model, three_markets()).await);
    assert!(err.is_fatal());
    let PropError::EmptyResult { attempted, failures } = err else {
        panic!("expected EmptyResult");
    };
    assert_eq!(attempted, 3);
    let ids: Vec<_> = failures.iter().map(|f| f.key.player_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(failures.iter().all(|f| f.kind == FailureKind::MissingData));
}

#[tokio::test]
async fn test_model_error_isolated() {
    // No probability for "c": the model errors on that market only
    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.45)]));
    let out = assert_ok!(run(config(4), Arc::new(three_players()), model, three_markets()).await);

    assert_eq!(out.report.succeeded, 2);
    assert_eq!(out.report.count(FailureKind::Model), 1);
    assert!(out.report.failures[0].message.contains(MODEL_VERSION));
}

#[tokio::test]
async fn test_invalid_odds_isolated() {
    let mut markets = three_markets();
    markets[1].over_price = Price::Decimal(0.9);
    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)]));
    let out = assert_ok!(run(config(4), Arc::new(three_players()), model, markets).await);

    assert_eq!(out.report.count(FailureKind::InvalidOdds), 1);
    assert_eq!(out.report.failures[0].key.player_id, "b");
}

#[tokio::test]
async fn test_failures_reported_in_input_order() {
    let source = ScriptedSource::new().with_history(history("b", 22.0, 12));
    let model = Arc::new(TableModel::new(&[("b", 0.6)]));
    let out = assert_ok!(run(config(3), Arc::new(source), model, three_markets()).await);

    let ids: Vec<_> = out
        .report
        .failures
        .iter()
        .map(|f| f.key.player_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn test_source_errors_exhaust_retries() {
    let mut mock = MockSource::new();
    // max_attempts = 2 per market
    mock.expect_get_history()
        .times(6)
        .returning(|_, _| Err(anyhow!("connection refused")));
    mock.expect_get_context().times(0);

    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)]));
    let err = assert_err!(run(config(2), Arc::new(mock), model, three_markets()).await);
    let PropError::EmptyResult { failures, .. } = err else {
        panic!("expected EmptyResult");
    };
    assert_eq!(failures.len(), 3);
    assert!(failures.iter().all(|f| f.kind == FailureKind::DataSource));
    assert!(failures[0].message.contains("connection refused"));
}

#[tokio::test]
async fn test_flaky_source_recovers_on_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let mut mock = MockSource::new();
    mock.expect_get_history().returning(move |id, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(anyhow!("timeout talking to stats service"))
        } else {
            Ok(history(id, 30.0, 12))
        }
    });
    mock.expect_get_context()
        .returning(|_, opponent| Ok(Some(context(opponent))));

    let model = Arc::new(TableModel::new(&[("a", 0.6)]));
    let markets = vec![market("a", "Alpha", MarketType::Points, 27.5)];
    let out = assert_ok!(run(config(1), Arc::new(mock), model, markets).await);

    assert_eq!(out.report.succeeded, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_history_failure_is_data_source_failure() {
    let source = three_players().failing_for("b");
    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)]));
    let out = assert_ok!(run(config(4), Arc::new(source), model, three_markets()).await);

    assert_eq!(out.report.count(FailureKind::DataSource), 1);
    assert!(out.report.failures[0].message.contains("503"));
}

#[tokio::test]
async fn test_context_failure_degrades_to_fallback() {
    let source = three_players().failing_context();
    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)]));
    let out = assert_ok!(run(config(4), Arc::new(source), model, three_markets()).await);

    assert_eq!(out.report.succeeded, 3);
    assert!(out
        .selection
        .ranked
        .iter()
        .all(|s| s.data_quality == DataQuality::Fallback));
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let mut cfg = config(2);
    cfg.data.timeout_ms = 20;
    let source = three_players().with_delay(Duration::from_millis(250));
    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)]));
    let err = assert_err!(run(cfg, Arc::new(source), model, three_markets()).await);
    assert!(matches!(err, PropError::EmptyResult { attempted: 3, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unsafe_model_calls_are_serialised() {
    let model = Arc::new(
        TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)])
            .single_threaded(Duration::from_millis(20)),
    );
    let out = assert_ok!(
        run(
            config(3),
            Arc::new(three_players()),
            model.clone(),
            three_markets()
        )
        .await
    );
    assert_eq!(out.report.succeeded, 3);
    assert_eq!(model.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancellation_returns_partial_run() {
    let source = Arc::new(three_players().with_delay(Duration::from_millis(100)));
    let model = Arc::new(TableModel::new(&[("a", 0.6), ("b", 0.6), ("c", 0.6)]));
    let pipeline = Pipeline::new(Arc::new(config(1)), source.clone(), model).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let out = assert_ok!(pipeline.run(three_markets(), cancel).await);
    assert!(out.report.partial);
    assert!(out.report.skipped > 0);
    assert_eq!(out.report.succeeded + out.report.failed() + out.report.skipped, 3);
    assert_eq!(
        source.history_calls.load(Ordering::SeqCst),
        3 - out.report.skipped
    );
}

#[tokio::test]
async fn test_duplicate_quotes_keep_larger_edge() {
    let mut alt = market("a", "Alpha", MarketType::Points, 29.5);
    alt.over_price = Price::American(-150.0);
    alt.under_price = Price::American(130.0);
    let markets = vec![market("a", "Alpha", MarketType::Points, 27.5), alt];

    let model = Arc::new(TableModel::new(&[("a", 0.6)]));
    let out = assert_ok!(run(config(2), Arc::new(three_players()), model, markets).await);

    // -110/-110 prices the over at 50%, -150/+130 at about 58%
    assert_eq!(out.selection.len(), 1);
    assert_eq!(out.selection.ranked[0].market.line, 27.5);
    assert_eq!(
        out.selection
            .dropped_count(|r| matches!(r, DropReason::Duplicate { .. })),
        1
    );
}

#[tokio::test]
async fn test_distribution_model_end_to_end_is_deterministic() {
    let mut cfg = config(4);
    cfg.pipeline.model_version = "dist-v2".into();
    let run_once = || {
        let cfg = cfg.clone();
        async move {
            let model = Arc::new(DistributionModel::new("dist-v2"));
            run(cfg, Arc::new(three_players()), model, three_markets()).await
        }
    };

    let first = assert_ok!(run_once().await);
    let second = assert_ok!(run_once().await);
    let view = |o: &PipelineOutput| {
        o.selection
            .ranked
            .iter()
            .map(|s| (s.key(), s.model_probability, s.confidence_score))
            .collect::<Vec<_>>()
    };
    assert_eq!(view(&first), view(&second));
    assert_eq!(first.report.model_version, "dist-v2");
}
