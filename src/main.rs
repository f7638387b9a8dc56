//! reconcile - Schema and Data Reconciliation Engine
//!
//! Brings PostgreSQL replicas in line with a master database.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbreconcile::config::{LoggingConfig, ReconcileConfig};
use dbreconcile::executor::PgConnector;
use dbreconcile::operator::{AssumeYes, ConsoleOperator, Operator};
use dbreconcile::orchestrator::{PassOptions, Reconciler, Report};
use dbreconcile::registry;

/// reconcile - Schema and Data Reconciliation Engine
#[derive(Parser)]
#[command(name = "reconcile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "reconcile.toml", global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation pass
    Sync {
        /// Print the statements a pass would execute without running them
        #[arg(long)]
        dry_run: bool,

        /// Only reconcile these tables (comma separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,

        /// Resolve lookup conflicts interactively after propagation
        #[arg(long)]
        resolve_conflicts: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Only resolve lookup table conflicts
    Resolve {
        /// Only check these tables (comma separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },

    /// Validate configuration file
    Validate,

    /// Write a sample configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "reconcile.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync {
            dry_run,
            tables,
            resolve_conflicts,
            yes,
        } => {
            let options = PassOptions {
                dry_run,
                tables,
                resolve_conflicts,
                assume_yes: yes,
            };
            run_pass(&cli.config, cli.verbose, options, false).await
        }
        Commands::Resolve { tables } => {
            let options = PassOptions {
                tables,
                resolve_conflicts: true,
                ..Default::default()
            };
            run_pass(&cli.config, cli.verbose, options, true).await
        }
        Commands::Validate => run_validate(&cli.config),
        Commands::Init { output } => run_init(&output),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Initialize logging
fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "compact" {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}

/// Run a pass, or only conflict resolution, and print its report
async fn run_pass(
    config_path: &Path,
    verbose: bool,
    options: PassOptions,
    resolve_only: bool,
) -> anyhow::Result<ExitCode> {
    let config = ReconcileConfig::from_file(config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    init_logging(verbose, &config.logging);

    tracing::info!(
        "Master: {}@{}:{}/{}",
        config.master.user,
        config.master.host,
        config.master.port,
        config.master.database
    );
    if options.dry_run {
        tracing::info!("Dry run: no statement will be executed");
    }

    let connector = PgConnector::new(config.master.clone());
    let replicas = registry::from_config(&config.registry);
    let mut operator: Box<dyn Operator> = if options.assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(ConsoleOperator::new())
    };

    let mut reconciler = Reconciler::new(&config, &connector, replicas.as_ref(), operator.as_mut());
    let report: Report = if resolve_only {
        reconciler.resolve_only(&options).await
    } else {
        reconciler.run(&options).await
    };

    println!("{}", report.render());
    Ok(ExitCode::from(report.status().exit_code()))
}

/// Validate configuration file
fn run_validate(config_path: &Path) -> anyhow::Result<ExitCode> {
    match ReconcileConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!(
                "  Master: {}@{}:{}/{}",
                config.master.user, config.master.host, config.master.port, config.master.database
            );
            println!("  Registry: {:?}", config.registry.kind);
            println!("  Contributing tables: {}", config.contributing_tables.join(", "));
            println!("  Lookup tables: {}", config.lookup_tables.len());
            println!("  References: {}", config.references.len());
            println!("  Backup: {}", if config.backup.enabled { "enabled" } else { "disabled" });
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Ok(ExitCode::from(2))
        }
    }
}

/// Write a sample configuration file
fn run_init(output: &Path) -> anyhow::Result<ExitCode> {
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }

    std::fs::write(output, ReconcileConfig::sample())
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("✓ Configuration written to {}", output.display());
    println!("  Edit the [master] section, then run: reconcile validate");
    Ok(ExitCode::SUCCESS)
}
