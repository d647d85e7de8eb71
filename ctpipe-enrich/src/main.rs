//! ctpipe - Clinical Trial Termination Enrichment Pipeline
//!
//! Enriches terminated clinical trial records from independent external
//! sources, classifies each trial's failure reason, and exports a
//! quality-filtered dataset.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ctpipe_enrich::analysis::{AnthropicClient, FailureAnalyzer};
use ctpipe_enrich::config::{
    resolve_aact_db_url, resolve_anthropic_api_key, resolve_anthropic_model,
};
use ctpipe_enrich::connectors::{
    AactClient, ChemblClient, ConnectorSet, CtGovClient, PubChemClient, PubMedClient,
    StringDbClient, UniProtClient,
};
use ctpipe_enrich::export::{DatasetExporter, ExportOptions};
use ctpipe_enrich::models::{Confidence, PipelineRun, RunKind, RunState};
use ctpipe_enrich::orchestrator::EnrichmentOrchestrator;
use ctpipe_enrich::queue::RetryQueue;
use ctpipe_enrich::{db, ingest};

#[derive(Parser)]
#[command(name = "ctpipe", version, about = "Clinical trial termination enrichment pipeline")]
struct Cli {
    /// Data directory (overrides CTPIPE_DATA_DIR and TOML config)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed trial records from the upstream registry or a JSON file
    Ingest {
        /// JSON seed file (array of seed records); registry query when absent
        #[arg(long)]
        seed_file: Option<PathBuf>,
        /// Earliest trial start year for the registry query
        #[arg(long, default_value_t = 2010)]
        start_year: i32,
        /// Record cap for testing
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Run the forward enrichment sweep, then the retry sweep
    Enrich,
    /// Run the retry sweep only
    Retry,
    /// Classify failure reasons for fully-detailed records
    Analyze {
        /// Record cap for testing
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Export the quality-filtered dataset
    Export {
        /// Output JSON path
        #[arg(long, default_value = "ml_dataset.json")]
        output: PathBuf,
        /// Minimum confidence level (low/medium/high)
        #[arg(long, default_value = "low")]
        min_confidence: String,
        /// Keep only records with protein cross-referenced targets
        #[arg(long)]
        require_targets: bool,
        /// Enforce strict completeness (validation dataset)
        #[arg(long)]
        validation_mode: bool,
        /// Export the interaction-focused dataset variant instead
        #[arg(long)]
        ppi_focus: bool,
    },
    /// Show stage status counts and retry queue depth
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    info!("Starting ctpipe v{}", env!("CARGO_PKG_VERSION"));

    let config_path = ctpipe_common::config::default_config_path()?;
    let toml_config = ctpipe_common::config::load_toml_config(&config_path)?;

    let data_dir =
        ctpipe_common::config::resolve_data_dir(cli.data_dir.as_deref(), &toml_config);
    let db_path = data_dir.join("ctpipe.db");
    info!("Database: {}", db_path.display());

    let pool = db::init_database_pool(&db_path).await?;

    let stale = db::runs::cleanup_stale_runs(&pool).await?;
    if stale > 0 {
        info!(stale, "Marked stale runs as failed");
    }

    match cli.command {
        Command::Ingest {
            seed_file,
            start_year,
            limit,
        } => {
            let mut run = PipelineRun::new(RunKind::Ingest);
            db::runs::save_run(&pool, &run).await?;

            let stats = match seed_file {
                Some(path) => ingest::seed_from_file(&pool, &path).await?,
                None => {
                    let url = resolve_aact_db_url(&toml_config).context(
                        "Registry database URL not configured. Set CTPIPE_AACT_DB_URL or \
                         aact_db_url in the TOML config, or pass --seed-file.",
                    )?;
                    let registry = AactClient::connect(&url)
                        .await
                        .map_err(|e| anyhow::anyhow!("Registry connection failed: {}", e))?;
                    ingest::seed_from_registry(&pool, &registry, start_year, limit).await?
                }
            };

            run.processed = stats.total as u64;
            run.succeeded = stats.inserted as u64;
            run.finish(RunState::Completed);
            db::runs::save_run(&pool, &run).await?;

            println!(
                "Ingested {} records ({} new, {} already present)",
                stats.total, stats.inserted, stats.skipped
            );
        }

        Command::Enrich => {
            let mut run = PipelineRun::new(RunKind::Enrich);
            db::runs::save_run(&pool, &run).await?;

            let connectors = build_connectors(&toml_config).await?;
            let analyzer = build_analyzer(&pool, &toml_config);
            let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, analyzer);

            let forward = orchestrator.run_enrich_sweep().await?;
            let retry = orchestrator.run_retry_sweep(chrono::Utc::now()).await?;

            run.processed = forward.processed + retry.processed;
            run.succeeded = forward.succeeded + retry.succeeded;
            run.failed = retry.permanently_failed;
            run.queued = forward.queued + retry.rescheduled;
            run.finish(RunState::Completed);
            db::runs::save_run(&pool, &run).await?;

            println!(
                "Enrichment sweep: {} processed, {} succeeded, {} queued for retry",
                run.processed, run.succeeded, run.queued
            );
        }

        Command::Retry => {
            let mut run = PipelineRun::new(RunKind::Retry);
            db::runs::save_run(&pool, &run).await?;

            let connectors = build_connectors(&toml_config).await?;
            let analyzer = build_analyzer(&pool, &toml_config);
            let mut orchestrator = EnrichmentOrchestrator::new(pool.clone(), connectors, analyzer);

            let stats = orchestrator.run_retry_sweep(chrono::Utc::now()).await?;

            run.processed = stats.processed;
            run.succeeded = stats.succeeded;
            run.failed = stats.permanently_failed;
            run.queued = stats.rescheduled;
            run.finish(RunState::Completed);
            db::runs::save_run(&pool, &run).await?;

            println!(
                "Retry sweep: {} attempted, {} succeeded, {} rescheduled, {} permanently failed",
                stats.processed, stats.succeeded, stats.rescheduled, stats.permanently_failed
            );
        }

        Command::Analyze { limit } => {
            let mut run = PipelineRun::new(RunKind::Analyze);
            db::runs::save_run(&pool, &run).await?;

            let mut analyzer = build_analyzer(&pool, &toml_config).context(
                "Anthropic API key not configured. Set ANTHROPIC_API_KEY or \
                 anthropic_api_key in the TOML config.",
            )?;

            let stats = analyzer.analyze_pending(limit).await?;

            run.processed = stats.analyzed + stats.cache_hits + stats.overrides + stats.queued;
            run.succeeded = stats.analyzed + stats.cache_hits + stats.overrides;
            run.queued = stats.queued;
            run.finish(RunState::Completed);
            db::runs::save_run(&pool, &run).await?;

            println!(
                "Classification: {} via model, {} cache hits, {} heuristic overrides, {} queued",
                stats.analyzed, stats.cache_hits, stats.overrides, stats.queued
            );
            println!(
                "Tokens used: {} (~${:.2})",
                stats.total_tokens, stats.total_cost_usd
            );
        }

        Command::Export {
            output,
            min_confidence,
            require_targets,
            validation_mode,
            ppi_focus,
        } => {
            let mut run = PipelineRun::new(RunKind::Export);
            db::runs::save_run(&pool, &run).await?;

            let exporter = DatasetExporter::new(pool.clone());

            let report = if ppi_focus {
                exporter.export_ppi_focus(&output).await?
            } else {
                let min_confidence = Confidence::parse(&min_confidence)
                    .context("Invalid --min-confidence (expected low, medium, or high)")?;
                let options = ExportOptions {
                    min_confidence,
                    require_targets,
                    validation_mode,
                };
                exporter.export_dataset(&output, &options).await?
            };

            run.processed = report.total_enriched as u64;
            run.succeeded = report.exported as u64;
            run.finish(RunState::Completed);
            db::runs::save_run(&pool, &run).await?;

            println!(
                "Exported {}/{} records to {}",
                report.exported,
                report.total_enriched,
                output.display()
            );
            for (reason, count) in &report.dropped {
                println!("  dropped ({}): {}", reason, count);
            }
            for (category, count) in &report.category_counts {
                println!("  {}: {}", category, count);
            }
        }

        Command::Status => {
            let total = db::trials::count_trials(&pool).await?;
            let counts = db::trials::stage_status_counts(&pool).await?;
            let queue = RetryQueue::new(pool.clone());
            let queued = queue.len().await?;
            let cached = db::llm_cache::count(&pool).await?;

            println!("Records: {}", total);
            let mut current_stage = None;
            for (stage, status, n) in counts {
                if current_stage != Some(stage) {
                    println!("{}:", stage);
                    current_stage = Some(stage);
                }
                println!("  {}: {}", status, n);
            }
            println!("Retry queue entries: {}", queued);
            println!("Cached classifications: {}", cached);
        }
    }

    Ok(())
}

/// Construct the live connector set
async fn build_connectors(
    toml_config: &ctpipe_common::config::TomlConfig,
) -> Result<ConnectorSet> {
    let trial_registry = match resolve_aact_db_url(toml_config) {
        Some(url) => match AactClient::connect(&url).await {
            Ok(client) => Some(Arc::new(client) as Arc<dyn ctpipe_enrich::connectors::TrialRegistry>),
            Err(e) => {
                tracing::warn!(error = %e, "Registry database unavailable, description/document lookups disabled");
                None
            }
        },
        None => {
            tracing::info!("Registry database not configured, description/document lookups disabled");
            None
        }
    };

    Ok(ConnectorSet {
        normalizer: Some(Arc::new(
            PubChemClient::new().map_err(|e| anyhow::anyhow!("{}", e))?,
        )),
        targets_primary: Arc::new(ChemblClient::new().map_err(|e| anyhow::anyhow!("{}", e))?),
        targets_fallback: Some(Arc::new(
            UniProtClient::new().map_err(|e| anyhow::anyhow!("{}", e))?,
        )),
        interactions: Arc::new(StringDbClient::new().map_err(|e| anyhow::anyhow!("{}", e))?),
        literature: Arc::new(PubMedClient::new().map_err(|e| anyhow::anyhow!("{}", e))?),
        study_registry: Arc::new(CtGovClient::new().map_err(|e| anyhow::anyhow!("{}", e))?),
        trial_registry,
    })
}

/// Construct the classification engine when an API key is configured
fn build_analyzer(
    pool: &sqlx::SqlitePool,
    toml_config: &ctpipe_common::config::TomlConfig,
) -> Option<FailureAnalyzer> {
    let api_key = resolve_anthropic_api_key(toml_config)?;
    let model = resolve_anthropic_model(toml_config);

    match AnthropicClient::new(api_key, model) {
        Ok(client) => Some(FailureAnalyzer::new(pool.clone(), Arc::new(client))),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to initialize model client, classification disabled");
            None
        }
    }
}
