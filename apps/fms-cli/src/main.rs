//! fms-sync CLI - Operate facility FMS synchronization
//!
//! This CLI enables operators to:
//! - Run a sync against a fixture-backed FMS and review its changes
//! - Browse sync history and the changes each sync detected
//! - Probe a provider configuration
//! - Reconcile syncs left behind by a stopped engine

use clap::{Parser, Subcommand};

mod commands;
mod context;
mod error;
mod fixtures;
mod logging;
mod output;

use error::CliResult;
use logging::LogFormat;

/// fms-sync CLI - Facility tenant/unit synchronization
#[derive(Parser)]
#[command(name = "fms-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string; state stays in memory when absent
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Log line format
    #[arg(long, env = "FMS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// Log filter directive, overridden by RUST_LOG
    #[arg(long, default_value = "warn,fms_sync=info", global = true)]
    log_filter: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync for a facility
    Sync(commands::sync::SyncArgs),

    /// List past syncs of a facility
    History(commands::history::HistoryArgs),

    /// Show the changes one sync detected
    Changes(commands::changes::ChangesArgs),

    /// Probe an FMS provider configuration
    TestConnection(commands::test_connection::TestConnectionArgs),

    /// Fail interrupted syncs and restore open reviews
    Recover(commands::recover::RecoverArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init_logging(cli.log_format, &cli.log_filter);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let database_url = cli.database_url.as_deref();
    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args, database_url).await,
        Commands::History(args) => commands::history::execute(args, database_url).await,
        Commands::Changes(args) => commands::changes::execute(args, database_url).await,
        Commands::TestConnection(args) => commands::test_connection::execute(args).await,
        Commands::Recover(args) => commands::recover::execute(args, database_url).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from([
            "fms-sync",
            "--log-format",
            "json",
            "sync",
            "--external",
            "fixtures/facility-external.json",
            "--decide",
            "approve",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Sync(ref args) if args.decide.is_some()));
    }

    #[test]
    fn test_write_back_requires_internal() {
        let result = Cli::try_parse_from([
            "fms-sync",
            "sync",
            "--external",
            "x.json",
            "--write-back",
        ]);
        assert!(result.is_err());
    }
}
