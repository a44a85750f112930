use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "fmxmirror",
    version,
    about = "Mirror FMX facility events into the Employee App calendar"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass against the remote calendar
    Sync {
        /// Classify only; make no remote or ledger changes
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete stale remote events that started before the cutoff
    Prune {
        /// Age cutoff in days
        #[arg(long, default_value_t = 14)]
        older_than_days: i64,
        /// Count only; delete nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Report ledger/remote mismatches (reconciliation hazards)
    Audit,
    /// Show ledger statistics
    Status,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Sync { dry_run } => commands::sync::run(dry_run).await,
        Commands::Prune {
            older_than_days,
            dry_run,
        } => commands::prune::run(older_than_days, dry_run).await,
        Commands::Audit => commands::audit::run().await,
        Commands::Status => commands::status::run(),
        Commands::Config { action } => commands::config::run(action),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
