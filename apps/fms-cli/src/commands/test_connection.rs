//! Test-connection command - Probe an FMS provider configuration

use clap::Args;
use fms_provider::config::ProviderConfig;
use fms_provider::types::ProviderType;
use fms_sync::config::EngineConfig;

use crate::context::AppContext;
use crate::error::{CliError, CliResult};
use crate::output::print_success;

/// Arguments for the test-connection command
#[derive(Args)]
pub struct TestConnectionArgs {
    /// Provider type, e.g. simulated or sitelink
    #[arg(long, default_value = "simulated")]
    pub provider: String,

    /// Provider settings as a JSON object
    #[arg(long, default_value = "{}")]
    pub settings: String,
}

/// Execute the test-connection command
pub async fn execute(args: TestConnectionArgs) -> CliResult<()> {
    let provider_type: ProviderType = args.provider.parse().map_err(CliError::Validation)?;
    let settings: serde_json::Value = serde_json::from_str(&args.settings)
        .map_err(|e| CliError::Validation(format!("Invalid --settings: {e}")))?;
    let config = ProviderConfig::new(provider_type).with_settings(settings);
    config
        .validate()
        .map_err(|e| CliError::Validation(e.to_string()))?;

    let ctx = AppContext::build(None, EngineConfig::from_env()).await?;
    if ctx.orchestrator.test_connection(&config).await {
        print_success(&format!("Connected to {} FMS", config.provider_type));
        Ok(())
    } else {
        Err(CliError::ConnectionFailed)
    }
}
