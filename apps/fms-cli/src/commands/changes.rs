//! Changes command - Show the changes one sync detected

use clap::Args;
use fms_sync::config::EngineConfig;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::CliResult;
use crate::output::print_changes;

/// Arguments for the changes command
#[derive(Args)]
pub struct ChangesArgs {
    /// Sync log to inspect
    #[arg(long)]
    pub sync_log: Uuid,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the changes command
pub async fn execute(args: ChangesArgs, database_url: Option<&str>) -> CliResult<()> {
    let ctx = AppContext::build(database_url, EngineConfig::from_env()).await?;
    ctx.require_database("changes")?;

    let changes = ctx.orchestrator.get_sync_changes(args.sync_log).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else {
        print_changes(&changes);
    }
    Ok(())
}
