//! PROPEDGE: player-prop scoring and ranking pipeline.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! reads a slate snapshot, runs the pipeline once and prints the ranked
//! shortlist. Ctrl+C cancels cooperatively and prints a partial result.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use propedge::config::AppConfig;
use propedge::data::SlateSnapshot;
use propedge::engine::{Pipeline, PipelineOutput};
use propedge::model::load_model;
use propedge::output;
use propedge::types::PropError;

/// Exit code for configuration and startup failures.
const EXIT_STARTUP: u8 = 2;
/// Exit code when no market produced a score.
const EXIT_EMPTY: u8 = 3;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Score a slate of player props and print the ranked shortlist.
#[derive(Parser, Debug)]
#[command(name = "propedge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PROPEDGE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Slate snapshot (markets, game logs, matchup context) as JSON
    #[arg(short, long)]
    slate: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    init_logging();

    let (pipeline, markets) = match startup(&cli) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Startup failed");
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, finishing in-flight markets");
            shutdown.cancel();
        }
    });

    match pipeline.run(markets, cancel).await {
        Ok(out) => match print_output(&out, cli.format) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to render output");
                ExitCode::FAILURE
            }
        },
        Err(e @ PropError::EmptyResult { .. }) => {
            error!(error = %e, "Run produced no scores");
            eprintln!("error: {e}");
            if let PropError::EmptyResult { failures, .. } = &e {
                for f in failures {
                    eprintln!("  {} [{}] {}: {}", f.player_name, f.key, f.kind, f.message);
                }
            }
            ExitCode::from(EXIT_EMPTY)
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("error: {e}");
            if e.is_fatal() {
                ExitCode::from(EXIT_STARTUP)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Everything that must succeed before the first market is processed.
fn startup(cli: &Cli) -> Result<(Pipeline, Vec<propedge::types::PropMarket>)> {
    let config_path = cli.config.to_string_lossy();
    let cfg = Arc::new(AppConfig::load(&config_path)?);

    info!(
        config = %config_path,
        window_size = cfg.pipeline.window_size,
        min_confidence = cfg.pipeline.min_confidence,
        min_edge = cfg.pipeline.min_edge,
        top_k = cfg.pipeline.top_k,
        concurrency = cfg.pipeline.concurrency,
        model_version = %cfg.pipeline.model_version,
        "PROPEDGE starting up"
    );

    let model = load_model(&cfg)?;
    let (markets, source) = SlateSnapshot::load(&cli.slate)?.into_parts();
    let pipeline = Pipeline::new(Arc::clone(&cfg), Arc::new(source), model)
        .context("Failed to build pipeline")?;
    Ok((pipeline, markets))
}

fn print_output(out: &PipelineOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", output::render_text(out)),
        OutputFormat::Json => println!("{}", output::render_json(out)?),
    }
    Ok(())
}

/// Initialise the tracing subscriber.
///
/// Uses `RUST_LOG` when set, otherwise `propedge=info`. Set
/// `PROPEDGE_LOG_JSON` for JSON lines. Logs go to stderr so stdout
/// carries only the rendered result.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("propedge=info"));

    let json_logging = std::env::var("PROPEDGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
