//! Recover command - Reconcile syncs left behind by a stopped engine

use clap::Args;
use fms_sync::config::EngineConfig;

use crate::context::AppContext;
use crate::error::CliResult;
use crate::output::{print_key_value, print_success};

/// Arguments for the recover command
#[derive(Args)]
pub struct RecoverArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the recover command
pub async fn execute(args: RecoverArgs, database_url: Option<&str>) -> CliResult<()> {
    let ctx = AppContext::build(database_url, EngineConfig::from_env()).await?;
    ctx.require_database("recover")?;

    let report = ctx.orchestrator.recover().await?;

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "interrupted": report.interrupted,
                "reviews_restored": report.reviews_restored,
            })
        );
    } else {
        print_success("Recovery finished");
        print_key_value("Interrupted syncs failed", &report.interrupted.to_string());
        print_key_value("Reviews still open", &report.reviews_restored.to_string());
    }
    Ok(())
}
