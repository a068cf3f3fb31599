//! Wiring shared by every command.

use fms_provider::registry::ProviderRegistry;
use fms_sync::config::EngineConfig;
use fms_sync::orchestrator::SyncOrchestrator;
use fms_sync::records::InMemoryFacilityRecords;
use fms_sync::store::{FacilityConfigStore, MemorySyncStore, PgSyncStore, SyncHistoryStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

use crate::error::{CliError, CliResult};

/// Stores, records and the orchestrator for one CLI invocation.
pub struct AppContext {
    pub orchestrator: SyncOrchestrator,
    pub configs: Arc<dyn FacilityConfigStore>,
    pub records: Arc<InMemoryFacilityRecords>,
    persistent: bool,
}

impl AppContext {
    /// Build against PostgreSQL when a database URL is given, memory otherwise.
    pub async fn build(database_url: Option<&str>, engine: EngineConfig) -> CliResult<Self> {
        let (configs, history, persistent) = match database_url {
            Some(url) => {
                let (configs, history) = postgres_stores(url).await?;
                (configs, history, true)
            }
            None => {
                let (configs, history) = memory_stores();
                (configs, history, false)
            }
        };

        let records = Arc::new(InMemoryFacilityRecords::new());
        let orchestrator = SyncOrchestrator::new(
            engine,
            ProviderRegistry::with_defaults(),
            configs.clone(),
            history,
            records.clone(),
        )?;

        Ok(Self {
            orchestrator,
            configs,
            records,
            persistent,
        })
    }

    /// Fail unless state outlives this process.
    pub fn require_database(&self, command: &str) -> CliResult<()> {
        if self.persistent {
            Ok(())
        } else {
            Err(CliError::Config(format!(
                "'{command}' needs --database-url (or DATABASE_URL)"
            )))
        }
    }
}

type Stores = (Arc<dyn FacilityConfigStore>, Arc<dyn SyncHistoryStore>);

async fn postgres_stores(url: &str) -> CliResult<Stores> {
    let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
    let store = Arc::new(PgSyncStore::new(pool));
    store.run_migrations().await?;
    info!("Using PostgreSQL sync store");
    let configs: Arc<dyn FacilityConfigStore> = store.clone();
    let history: Arc<dyn SyncHistoryStore> = store;
    Ok((configs, history))
}

fn memory_stores() -> Stores {
    let store = Arc::new(MemorySyncStore::new());
    let configs: Arc<dyn FacilityConfigStore> = store.clone();
    let history: Arc<dyn SyncHistoryStore> = store;
    (configs, history)
}
