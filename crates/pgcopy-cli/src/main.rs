//! pgcopy CLI - streaming PostgreSQL table copy.

use clap::Parser;
use pgcopy::{dry_run, Config, CopyEngine, CopyError, CopyStats, PgSession, TablePlan};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pgcopy")]
#[command(about = "Copy tables between PostgreSQL databases with column transformations")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    file: PathBuf,

    /// Source connection string (overrides the config file)
    #[arg(long)]
    source: Option<String>,

    /// Target connection string (overrides the config file)
    #[arg(long)]
    target: Option<String>,

    /// Show the configured tables without connecting or copying
    #[arg(long)]
    dry_run: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), CopyError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.file)?;
    info!("Loaded configuration from {:?}", cli.file);
    let tables = config.tables();

    if cli.dry_run {
        let plans = dry_run(&tables);
        if cli.output_json {
            println!("{}", serde_json::to_string_pretty(&plans)?);
        } else {
            print_plans(&plans);
        }
        return Ok(());
    }

    let source_endpoint = config.source_endpoint(cli.source.as_deref())?;
    let target_endpoint = config.target_endpoint(cli.target.as_deref())?;

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler()?;

    let source = PgSession::connect(&source_endpoint, "source").await?;
    let target = PgSession::connect(&target_endpoint, "target").await?;

    let engine = CopyEngine::new(source, target);
    let stats = engine.run(&tables, cancel_token).await?;

    engine.source().close();
    engine.target().close();

    if cli.output_json {
        println!("{}", stats.summary().to_json()?);
    } else {
        print_summary(&stats);
    }

    if stats.cancelled {
        return Err(CopyError::Cancelled);
    }

    Ok(())
}

fn print_plans(plans: &[TablePlan]) {
    println!("Dry run: {} tables", plans.len());
    for plan in plans {
        println!("  {}.{}", plan.schema, plan.table);
        if !plan.ignore.is_empty() {
            println!("    Ignore: {}", plan.ignore.join(", "));
        }
        if !plan.transformed_columns.is_empty() {
            println!("    Transform: {}", plan.transformed_columns.join(", "));
        }
        if let Some(ref filter) = plan.filter {
            println!("    Filter: {}", filter);
        }
        println!("    Truncate: {}", plan.truncate);
    }
}

fn print_summary(stats: &CopyStats) {
    let summary = stats.summary();
    let status_msg = match summary.status.as_str() {
        "cancelled" => "Copy cancelled!",
        "completed_with_errors" => "Copy completed with errors!",
        _ => "Copy completed!",
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", summary.run_id);
    println!("  Duration: {:.2}s", summary.duration_seconds);
    println!(
        "  Tables: {}/{}",
        summary.tables_processed, summary.tables_total
    );
    println!("  Rows: {}", summary.rows_copied);
    println!("  Throughput: {} rows/sec", summary.rows_per_second);
    if !summary.errors.is_empty() {
        println!("  Errors ({}):", summary.errors.len());
        for (i, err) in summary.errors.iter().enumerate() {
            println!("    {}. {}: {}", i + 1, err.table, err.message);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, CopyError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Stopping after cleanup...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, CopyError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after cleanup...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
