use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use leaderboard_watch::config::{Config, ConfigOverrides, ValidatedConfig};
use leaderboard_watch::diff::{ChangeEvent, RunOutcome};
use leaderboard_watch::leaderboard::{parse_scrape_batch, ScrapeBatch, Snapshot, SourceId};
use leaderboard_watch::output::csv::{baseline_to_csv, events_to_csv};
use leaderboard_watch::output::json::{render_json, render_run_report};
use leaderboard_watch::output::table::{
    render_baseline_table, render_events_table, render_history_table, render_status_table,
};
use leaderboard_watch::run_pass;
use leaderboard_watch::snapshot::{history_cutoff, summarize_model_history, SnapshotStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "leaderboard-watch",
    about = "Detects meaningful movement on public LLM leaderboards"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Diff a scrape batch against the stored baseline.
    Diff {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(short = 's', long)]
        sources: Option<String>,
    },
    Baseline {
        #[arg(long)]
        source: Option<String>,
    },
    History {
        #[arg(long)]
        source: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    Prune,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    let source_filter = match &cli.command {
        Commands::Diff {
            sources: Some(raw), ..
        } => Some(split_source_list(raw)),
        _ => None,
    };
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.as_ref().map(|p| p.display().to_string()),
        enabled_sources: source_filter,
    });

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(*init, *show, &config, &config_path);
    }

    let validated = config
        .validate()
        .with_context(|| format!("invalid configuration: {}", config_path.display()))?;
    let mut store = SnapshotStore::open(&validated.db_path)?;

    match &cli.command {
        Commands::Diff { input, dry_run, .. } => {
            run_diff(&mut store, &validated, input, *dry_run, cli.output)?;
        }
        Commands::Baseline { source } => {
            let Some(mut baseline) = store.load_baseline()? else {
                println!("No baseline committed yet.");
                return Ok(());
            };
            if let Some(raw) = source {
                let wanted = SourceId::from_str(raw)?;
                baseline.sources.retain(|id, _| *id == wanted);
            }
            print_baseline(&baseline, cli.output)?;
        }
        Commands::History {
            source,
            model,
            limit,
        } => {
            let source = SourceId::from_str(source)?;
            let history = store.model_history(source, model, *limit)?;
            let first_seen = store.first_seen(source, model)?;
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_history_table(&history));
                    println!("{}", summarize_model_history(first_seen, &history));
                }
                OutputFormat::Json => println!("{}", render_json(&history)?),
                OutputFormat::Csv => {
                    let events: Vec<ChangeEvent> =
                        history.iter().map(|r| r.event.clone()).collect();
                    println!("{}", events_to_csv(&events)?);
                }
            }
        }
        Commands::Prune => {
            let cutoff = history_cutoff(Utc::now(), validated.lookback_days);
            let removed = store.prune_events(cutoff)?;
            println!("Removed {removed} history events recorded before {cutoff}");
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn run_diff(
    store: &mut SnapshotStore,
    validated: &ValidatedConfig,
    input: &Path,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed reading scrape batch: {}", input.display()))?;
    let batch = parse_scrape_batch(&raw, &validated.sources)
        .with_context(|| format!("invalid scrape batch: {}", input.display()))?;

    let now = Utc::now();
    let Some(baseline) = store.load_baseline()? else {
        return seed_baseline(store, validated, &batch, dry_run, now);
    };

    let outcome = run_pass(&baseline, &batch, &validated.thresholds, now);
    match format {
        OutputFormat::Json => println!("{}", render_run_report(&outcome)?),
        OutputFormat::Table => {
            print_events(&outcome.events, format)?;
            println!("{}", render_status_table(&outcome.statuses));
        }
        OutputFormat::Csv => print_events(&outcome.events, format)?,
    }

    if dry_run {
        info!("dry run: baseline left untouched");
        return Ok(());
    }
    let run_id = store.commit_run(&outcome)?;
    let removed = store.prune_events(history_cutoff(now, validated.lookback_days))?;
    info!(
        "committed run {run_id}: {} events ({} headline), pruned {removed}",
        outcome.events.len(),
        outcome.headline_count()
    );
    Ok(())
}

/// With no committed baseline there is nothing to compare against, so the
/// first batch becomes the baseline and produces no report.
fn seed_baseline(
    store: &mut SnapshotStore,
    validated: &ValidatedConfig,
    batch: &ScrapeBatch,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let outcome = run_pass(&Snapshot::new(now), batch, &validated.thresholds, now);
    let seeded = RunOutcome {
        events: Vec::new(),
        ..outcome
    };
    if seeded.baseline.is_empty() {
        return Err(anyhow!("cannot seed baseline: every source failed or was empty"));
    }
    println!(
        "Seeded baseline with {} entries across {} sources.",
        seeded.baseline.entry_count(),
        seeded.baseline.sources.len()
    );
    if dry_run {
        info!("dry run: baseline not written");
        return Ok(());
    }
    let run_id = store.commit_run(&seeded)?;
    info!("committed seed run {run_id}");
    Ok(())
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        if config_path.exists() {
            return Err(anyhow!(
                "config already exists at {}, refusing to overwrite",
                config_path.display()
            ));
        }
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

/// `--sources a,b` as raw slugs; validation resolves them with the rest of
/// the config.
fn split_source_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_events(events: &[ChangeEvent], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_events_table(events));
            for event in events.iter().filter(|e| e.kind.is_headline()) {
                println!("{}", event.summary());
            }
        }
        OutputFormat::Json => println!("{}", render_json(events)?),
        OutputFormat::Csv => print!("{}", events_to_csv(events)?),
    }
    Ok(())
}

fn print_baseline(baseline: &Snapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("Baseline taken at {}", baseline.taken_at);
            println!("{}", render_baseline_table(baseline));
        }
        OutputFormat::Json => println!("{}", render_json(baseline)?),
        OutputFormat::Csv => print!("{}", baseline_to_csv(baseline)?),
    }
    Ok(())
}
