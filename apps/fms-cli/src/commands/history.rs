//! History command - List past syncs of a facility

use clap::Args;
use fms_sync::config::EngineConfig;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::{CliError, CliResult};
use crate::output::print_logs;

/// Arguments for the history command
#[derive(Args)]
pub struct HistoryArgs {
    /// Facility to list
    #[arg(long)]
    pub facility: Uuid,

    /// Maximum number of syncs to show (1-100)
    #[arg(long, default_value_t = 20)]
    pub limit: i64,

    /// Number of syncs to skip
    #[arg(long, default_value_t = 0)]
    pub offset: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the history command
pub async fn execute(args: HistoryArgs, database_url: Option<&str>) -> CliResult<()> {
    validate_pagination(args.limit, args.offset)?;

    let ctx = AppContext::build(database_url, EngineConfig::from_env()).await?;
    ctx.require_database("history")?;

    let history = ctx
        .orchestrator
        .get_sync_history(args.facility, Some(args.limit), Some(args.offset))
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else {
        print_logs(&history.logs, history.total);
    }
    Ok(())
}

fn validate_pagination(limit: i64, offset: i64) -> CliResult<()> {
    if !(1..=100).contains(&limit) {
        return Err(CliError::Validation(
            "Limit must be between 1 and 100.".to_string(),
        ));
    }
    if offset < 0 {
        return Err(CliError::Validation("Offset must be >= 0.".to_string()));
    }
    Ok(())
}
