//! Sync command - Run one facility sync against a fixture-backed FMS

use clap::{Args, ValueEnum};
use fms_provider::config::ProviderConfig;
use fms_sync::config::EngineConfig;
use fms_sync::events::SyncEventKind;
use fms_sync::model::{FacilitySyncConfig, TriggerSyncResult};
use fms_sync::records::FacilityRecords;
use fms_sync::review::ReviewPolicy;
use fms_sync::types::{ReviewDecision, SyncLogStatus};
use serde_json::json;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::{CliError, CliResult};
use crate::fixtures::{load_snapshot, save_snapshot};
use crate::output::{print_changes, print_key_value, print_success, print_summary, print_warning};

/// Which changes need review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PolicyArg {
    /// Removals and reassignments need review.
    #[default]
    Default,
    /// Every change needs review.
    ReviewAll,
    /// Nothing needs review.
    TrustAll,
}

impl PolicyArg {
    fn policy(self) -> ReviewPolicy {
        match self {
            PolicyArg::Default => ReviewPolicy::default(),
            PolicyArg::ReviewAll => ReviewPolicy::review_everything(),
            PolicyArg::TrustAll => ReviewPolicy::trust_everything(),
        }
    }
}

/// Decision applied to every change waiting for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecisionArg {
    Approve,
    Reject,
}

impl From<DecisionArg> for ReviewDecision {
    fn from(arg: DecisionArg) -> Self {
        match arg {
            DecisionArg::Approve => ReviewDecision::Approved,
            DecisionArg::Reject => ReviewDecision::Rejected,
        }
    }
}

/// Arguments for the sync command
#[derive(Args)]
pub struct SyncArgs {
    /// Snapshot the simulated FMS serves
    #[arg(long)]
    pub external: PathBuf,

    /// Facility records before the sync (empty facility when omitted)
    #[arg(long)]
    pub internal: Option<PathBuf>,

    /// Write the facility records back to --internal after the sync
    #[arg(long, requires = "internal")]
    pub write_back: bool,

    /// Facility to sync (a new one when omitted)
    #[arg(long)]
    pub facility: Option<Uuid>,

    /// Review policy
    #[arg(long, value_enum, default_value_t = PolicyArg::Default)]
    pub policy: PolicyArg,

    /// Decide every pending review right away
    #[arg(long, value_enum)]
    pub decide: Option<DecisionArg>,

    /// Who triggered the sync, recorded on the log
    #[arg(long, default_value = "cli")]
    pub triggered_by: String,

    /// Simulated FMS latency per fetch
    #[arg(long, default_value_t = 0)]
    pub latency_ms: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, database_url: Option<&str>) -> CliResult<()> {
    let external = load_snapshot(&args.external)?;
    let internal = match &args.internal {
        Some(path) => load_snapshot(path)?,
        None => Default::default(),
    };

    let engine = EngineConfig {
        review_policy: args.policy.policy(),
        ..EngineConfig::from_env()
    };
    let ctx = AppContext::build(database_url, engine).await?;
    let facility_id = args.facility.unwrap_or_else(Uuid::new_v4);

    ctx.records.seed(facility_id, internal).await;
    let provider = ProviderConfig::simulated().with_settings(json!({
        "fixture": serde_json::to_value(&external)?,
        "latency_ms": args.latency_ms,
        "name": format!("Fixture {}", args.external.display()),
    }));
    save_facility_config(&ctx, facility_id, provider).await?;

    let progress = (!args.json).then(|| spawn_progress_printer(&ctx));

    let mut result = ctx
        .orchestrator
        .trigger_sync(facility_id, Some(args.triggered_by.clone()))
        .await?;

    if result.status == SyncLogStatus::ReviewNeeded {
        if let Some(decision) = args.decide {
            result = decide_all(&ctx, &result, decision.into(), &args.triggered_by).await?;
        }
    }

    if let Some(handle) = progress {
        tokio::task::yield_now().await;
        handle.abort();
    }

    if args.write_back {
        if let Some(path) = &args.internal {
            let snapshot = ctx
                .records
                .load_snapshot(facility_id)
                .await
                .map_err(|e| CliError::Config(e.to_string()))?;
            save_snapshot(path, &snapshot)?;
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(facility_id, &result);
    }

    match result.status {
        SyncLogStatus::Completed | SyncLogStatus::ReviewNeeded => Ok(()),
        status => Err(CliError::SyncIncomplete {
            status: status.to_string(),
        }),
    }
}

async fn save_facility_config(
    ctx: &AppContext,
    facility_id: Uuid,
    provider: ProviderConfig,
) -> CliResult<()> {
    let config = match ctx.configs.get_config(facility_id).await? {
        Some(mut existing) => {
            existing.provider_type = provider.provider_type;
            existing.provider_settings = provider.settings;
            existing.updated_at = chrono::Utc::now();
            existing
        }
        None => FacilitySyncConfig::new(facility_id, provider),
    };
    ctx.configs.save_config(&config).await?;
    Ok(())
}

/// Decide every undecided change, then report the resumed sync.
async fn decide_all(
    ctx: &AppContext,
    result: &TriggerSyncResult,
    decision: ReviewDecision,
    reviewer: &str,
) -> CliResult<TriggerSyncResult> {
    for change in result.changes_detected.iter().filter(|c| c.is_pending_review()) {
        ctx.orchestrator
            .review_change(change.id, decision, Some(reviewer.to_string()))
            .await?;
    }

    Ok(ctx.orchestrator.get_sync_result(result.sync_log_id).await?)
}

fn spawn_progress_printer(ctx: &AppContext) -> tokio::task::JoinHandle<()> {
    let mut events = ctx.orchestrator.subscribe();
    tokio::spawn(async move {
        let mut last = None;
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let SyncEventKind::StepChanged { step, progress } = event.kind {
                        if last != Some((step, progress)) {
                            eprintln!("  [{progress:>3}%] {step}");
                            last = Some((step, progress));
                        }
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_result(facility_id: Uuid, result: &TriggerSyncResult) {
    println!();
    if result.success {
        print_success(&format!("Sync {}", result.status));
    } else {
        print_warning(&format!("Sync {}", result.status));
    }
    print_key_value("Facility", &facility_id.to_string());
    print_key_value("Sync log", &result.sync_log_id.to_string());
    print_summary(&result.summary);
    println!();
    print_changes(&result.changes_detected);

    if result.status == SyncLogStatus::ReviewNeeded {
        println!();
        print_warning("Changes are waiting for review. Re-run with --decide approve|reject.");
    }
}
