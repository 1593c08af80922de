use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mlb_stats_pipeline::{Pipeline, PipelineConfig, open_store};
use mlb_stats_sqlite::{CooccurrenceQuery, Grouping, IngestionTracker, PairCount, QueryOptions};

/// CLI-specific grouping enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliGrouping {
    Date,
    Game,
}

impl From<CliGrouping> for Grouping {
    fn from(grouping: CliGrouping) -> Self {
        match grouping {
            CliGrouping::Date => Self::Date,
            CliGrouping::Game => Self::Game,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "mlb-stats")]
#[command(about = "Load MLB extractor output into SQLite and rank home-run co-occurrences")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load every pending file into the store and archive it.
    Load(LoadArgs),
    /// Rank player pairs who homered on the same day.
    Query(QueryArgs),
    /// Show table counts and the processed and failed files.
    Status(StoreArgs),
    /// Clear a failure mark so the next load retries the file.
    ClearFailure(ClearFailureArgs),
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Database file path (overrides the configuration).
    #[arg(long)]
    db: Option<PathBuf>,
    /// Table prefix (overrides the configuration).
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Debug, Args)]
struct LoadArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Directory holding files to load.
    #[arg(long)]
    pending: Option<PathBuf>,
    /// Directory committed files are moved into.
    #[arg(long)]
    done: Option<PathBuf>,
    /// Maximum rows per insert statement.
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Player to leave out of the second ranking (repeatable).
    #[arg(long)]
    exclude: Vec<String>,
    /// Number of pairs to print.
    #[arg(long)]
    top: Option<usize>,
    /// Count co-occurrences once per day or once per game.
    #[arg(long, value_enum)]
    group_by: Option<CliGrouping>,
}

#[derive(Debug, Args)]
struct ClearFailureArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// File name as recorded in the failed files list.
    file_key: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Load(args) => run_load(args),
        Command::Query(args) => run_query(args),
        Command::Status(args) => run_status(args),
        Command::ClearFailure(args) => run_clear_failure(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_load(args: LoadArgs) -> Result<(), String> {
    let mut config = resolve_config(&args.store)?;
    if let Some(pending) = args.pending {
        config.pending_dir = pending;
    }
    if let Some(done) = args.done {
        config.done_dir = done;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }

    let summary = Pipeline::new(config)
        .run()
        .map_err(|e| format!("Load failed: {e}"))?;
    println!("Load complete:");
    println!("  Files processed: {}", summary.processed);
    println!("  Files failed: {}", summary.failed);
    println!("  Files skipped: {}", summary.skipped);
    println!("  Archive failures: {}", summary.archive_failures);
    println!("  Rows written: {}", summary.rows);
    println!("  Records dropped: {}", summary.dropped);
    Ok(())
}

fn run_query(args: QueryArgs) -> Result<(), String> {
    let mut config = resolve_config(&args.store)?;
    if !args.exclude.is_empty() {
        config.query.excluded_players = args.exclude;
    }
    if let Some(top) = args.top {
        config.query.top_n = top;
    }
    if let Some(group_by) = args.group_by {
        config.query.grouping = group_by.into();
    }

    let migration = open_existing_store(&config)?;
    let query = CooccurrenceQuery::new(migration.connection(), config.table_prefix.as_str())
        .map_err(|e| format!("Failed to prepare query: {e}"))?;

    let all = query
        .top_pairs(&config.query.unrestricted())
        .map_err(|e| format!("Query failed: {e}"))?;
    print_ranking("all players", &config.query.unrestricted(), &all);

    if !config.query.excluded_players.is_empty() {
        let options = config.query.restricted();
        let restricted = query
            .top_pairs(&options)
            .map_err(|e| format!("Query failed: {e}"))?;
        let label = format!("excluding {}", options.excluded_players.join(", "));
        println!();
        print_ranking(&label, &options, &restricted);
    }
    Ok(())
}

fn run_status(args: StoreArgs) -> Result<(), String> {
    let config = resolve_config(&args)?;
    let migration = open_existing_store(&config)?;
    let status = migration
        .status()
        .map_err(|e| format!("Failed to get store status: {e}"))?;

    println!("Store Status ({}):", config.database.display());
    println!("  Schema version: {}", status.schema_version.as_deref().unwrap_or("none"));
    println!("  Teams: {}", status.team_count);
    println!("  Players: {}", status.player_count);
    println!("  Games: {}", status.game_count);
    println!("  Batter stats: {}", status.batter_stat_count);
    println!("  Pitcher stats: {}", status.pitcher_stat_count);

    let tracker = IngestionTracker::new(migration.connection(), config.table_prefix.as_str())
        .map_err(|e| format!("Failed to read ledger: {e}"))?;
    let processed = tracker
        .processed_files()
        .map_err(|e| format!("Failed to read ledger: {e}"))?;
    println!("Processed files: {}", processed.len());
    for file in &processed {
        println!(
            "  {} (processed {}, {} games, {} dropped)",
            file.file_key, file.processed_at, file.counts.games, file.counts.dropped
        );
    }

    let failed = tracker
        .failed_files()
        .map_err(|e| format!("Failed to read ledger: {e}"))?;
    println!("Failed files: {}", failed.len());
    for file in &failed {
        println!("  {} [{}] {}", file.file_key, file.error_kind, file.message);
    }
    Ok(())
}

fn run_clear_failure(args: ClearFailureArgs) -> Result<(), String> {
    let config = resolve_config(&args.store)?;
    let migration = open_existing_store(&config)?;
    let tracker = IngestionTracker::new(migration.connection(), config.table_prefix.as_str())
        .map_err(|e| format!("Failed to read ledger: {e}"))?;
    let cleared = tracker
        .clear_failure(&args.file_key)
        .map_err(|e| format!("Failed to clear failure: {e}"))?;
    if !cleared {
        return Err(format!("'{}' is not marked as failed", args.file_key));
    }
    println!("Cleared failure for '{}'; it will be retried on the next load.", args.file_key);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Loads the configuration file if given and applies store overrides.
fn resolve_config(args: &StoreArgs) -> Result<PipelineConfig, String> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(db) = &args.db {
        config.database = db.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.table_prefix = prefix.clone();
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Opens the store for reading commands, refusing to create a new file.
fn open_existing_store(config: &PipelineConfig) -> Result<mlb_stats_sqlite::Migration, String> {
    if !config.database.exists() {
        return Err(format!(
            "Database '{}' does not exist; run `mlb-stats load` first",
            config.database.display()
        ));
    }
    open_store(config).map_err(|e| e.to_string())
}

fn print_ranking(label: &str, options: &QueryOptions, pairs: &[PairCount]) {
    println!(
        "Top {} home-run pairs by {} ({label}):",
        options.top_n, options.grouping
    );
    if pairs.is_empty() {
        println!("  (none)");
    }
    for (rank, pair) in pairs.iter().enumerate() {
        println!("{:>3}. {pair}", rank + 1);
    }
}
