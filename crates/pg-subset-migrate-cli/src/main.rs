//! pg-subset-migrate CLI - selective PostgreSQL table migration.

use clap::{Parser, Subcommand};
use pg_subset_migrate::{Config, MigrateError, Orchestrator, PlanReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

#[derive(Parser)]
#[command(name = "pg-subset-migrate")]
#[command(about = "Selective PostgreSQL table migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log file path
    #[arg(long, default_value = "migration.log")]
    log_file: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    Run {
        /// Migrate exactly these tables instead of the keyword heuristics
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,

        /// Show the plan without writing to the target
        #[arg(long)]
        dry_run: bool,
    },

    /// Show which tables would migrate, and in what order
    Plan,

    /// Test database connections
    HealthCheck,
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

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format, &cli.log_file)
        .map_err(MigrateError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run { tables, dry_run } => {
            if let Some(tables) = tables {
                config.migration.tables = Some(tables);
            }
            let orchestrator = Orchestrator::new(config);

            if dry_run {
                let report = orchestrator.plan().await?;
                print_plan(&report, cli.output_json)?;
                return Ok(());
            }

            let result = orchestrator.run().await?;
            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration {}", result.status);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Tables: {}/{}",
                    result.tables_migrated, result.tables_total
                );
                println!("  Rows: {}", result.rows_migrated);
                println!("  Throughput: {} rows/sec", result.rows_per_second);
                if !result.failed_tables.is_empty() {
                    println!("  Failed tables: {:?}", result.failed_tables);
                }
            }
        }

        Commands::Plan => {
            let orchestrator = Orchestrator::new(config);
            let report = orchestrator.plan().await?;
            print_plan(&report, cli.output_json)?;
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config);
            orchestrator.health_check().await?;
            println!("Health check passed");
        }
    }

    Ok(())
}

fn print_plan(report: &PlanReport, as_json: bool) -> Result<(), MigrateError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Selected tables ({}):", report.selected.len());
    for table in &report.selected {
        println!("  {}", table);
    }
    println!("\nMigration order:");
    for (i, table) in report.order.iter().enumerate() {
        println!("  {}. {}", i + 1, table);
    }
    println!("\nDDL:");
    for stmt in &report.ddl {
        println!("  {}", stmt);
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str, log_file: &Path) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        other => return Err(format!("Invalid verbosity '{}'", other)),
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::layer().with_target(false);
    if format == "json" {
        layers.push(console.json().with_filter(EnvFilter::new(level)).boxed());
    } else {
        layers.push(console.with_filter(EnvFilter::new(level)).boxed());
    }

    let dir = match log_file.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => Path::new("."),
    };
    let file_name = log_file
        .file_name()
        .ok_or_else(|| format!("Invalid log file path {:?}", log_file))?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Keep the flush guard alive for the process lifetime.
    std::mem::forget(guard);

    layers.push(
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(false)
            .with_filter(EnvFilter::new(level))
            .boxed(),
    );

    tracing_subscriber::registry().with(layers).init();
    Ok(())
}
