//! Shared fixtures for sync engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use fms_sync::prelude::*;
use fms_sync::records::RecordsResult;

pub use fms_provider::simulated::demo_snapshot;

/// Orchestrator wired to in-memory stores for one facility.
pub struct Harness {
    pub orchestrator: SyncOrchestrator,
    pub store: Arc<MemorySyncStore>,
    pub records: Arc<InMemoryFacilityRecords>,
    pub facility_id: Uuid,
}

impl Harness {
    pub async fn new(
        provider: Arc<dyn FmsProvider>,
        internal: FacilitySnapshot,
        config: EngineConfig,
    ) -> Self {
        let records = Arc::new(InMemoryFacilityRecords::new());
        Self::with_records(provider, internal, config, records.clone(), records).await
    }

    /// Build with a custom records backend; `seeded` receives the internal snapshot.
    pub async fn with_records(
        provider: Arc<dyn FmsProvider>,
        internal: FacilitySnapshot,
        config: EngineConfig,
        seeded: Arc<InMemoryFacilityRecords>,
        records: Arc<dyn FacilityRecords>,
    ) -> Self {
        let facility_id = Uuid::new_v4();
        seeded.seed(facility_id, internal).await;

        let store = Arc::new(MemorySyncStore::new());
        store
            .save_config(&FacilitySyncConfig::new(
                facility_id,
                ProviderConfig::simulated(),
            ))
            .await
            .unwrap();

        let orchestrator = SyncOrchestrator::new(
            config,
            registry_for(provider),
            store.clone(),
            store.clone(),
            records,
        )
        .unwrap();

        Self {
            orchestrator,
            store,
            records: seeded,
            facility_id,
        }
    }

    /// A second engine over the same stores, as after a process restart.
    pub fn restarted(&self, provider: Arc<dyn FmsProvider>) -> SyncOrchestrator {
        SyncOrchestrator::new(
            fast_config(),
            registry_for(provider),
            self.store.clone(),
            self.store.clone(),
            self.records.clone(),
        )
        .unwrap()
    }

    pub async fn trigger(&self) -> SyncResult<TriggerSyncResult> {
        self.orchestrator
            .trigger_sync(self.facility_id, Some("test-operator".to_string()))
            .await
    }

    pub async fn log(&self, sync_log_id: Uuid) -> SyncLog {
        self.store.get_log(sync_log_id).await.unwrap().unwrap()
    }

    pub async fn internal(&self) -> FacilitySnapshot {
        self.records.load_snapshot(self.facility_id).await.unwrap()
    }

    /// Poll status until the session reaches `step`.
    pub async fn wait_for_step(&self, step: SyncStep) {
        for _ in 0..10_000 {
            if let Some(view) = self.orchestrator.get_sync_status(self.facility_id).await {
                if view.step == step {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("session never reached {step}");
    }
}

pub fn registry_for(provider: Arc<dyn FmsProvider>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_instance(ProviderType::Simulated, provider);
    registry
}

/// Defaults with short, deterministic retry delays.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        retry: RetryConfig {
            max_retries: 3,
            initial_delay_ms: 10,
            max_delay_ms: 100,
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..EngineConfig::default()
    }
}

/// Unit B12 exists internally and is vacant.
pub fn vacant_b12() -> FacilitySnapshot {
    FacilitySnapshot::new(
        vec![],
        vec![UnitRecord::new("B12", UnitStatus::Vacant).with_external_id("U-B12")],
    )
}

/// The FMS reports Jane Doe renting B12.
pub fn jane_in_b12() -> FacilitySnapshot {
    FacilitySnapshot::new(
        vec![TenantRecord::new("Jane Doe")
            .with_external_id("T-1001")
            .with_email("jane.doe@example.com")
            .with_unit("B12")],
        vec![UnitRecord::new("B12", UnitStatus::Occupied)
            .with_external_id("U-B12")
            .with_tenant("T-1001")],
    )
}

/// John Smith rents A3 internally.
pub fn john_in_a3() -> FacilitySnapshot {
    FacilitySnapshot::new(
        vec![TenantRecord::new("John Smith")
            .with_external_id("T-2001")
            .with_unit("A3")],
        vec![UnitRecord::new("A3", UnitStatus::Occupied)
            .with_external_id("U-A3")
            .with_tenant("T-2001")],
    )
}

/// The FMS reports A3 vacant and John gone.
pub fn a3_vacated() -> FacilitySnapshot {
    FacilitySnapshot::new(
        vec![],
        vec![UnitRecord::new("A3", UnitStatus::Vacant).with_external_id("U-A3")],
    )
}

pub fn simulated(snapshot: FacilitySnapshot) -> Arc<SimulatedProvider> {
    Arc::new(SimulatedProvider::new(snapshot))
}

/// Drain every event received so far.
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Records backend that refuses to insert one tenant.
pub struct FlakyRecords {
    inner: Arc<InMemoryFacilityRecords>,
    refuse_name: String,
    refused: AtomicUsize,
}

impl FlakyRecords {
    pub fn new(inner: Arc<InMemoryFacilityRecords>, refuse_name: &str) -> Self {
        Self {
            inner,
            refuse_name: refuse_name.to_string(),
            refused: AtomicUsize::new(0),
        }
    }

    pub fn refused(&self) -> usize {
        self.refused.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FacilityRecords for FlakyRecords {
    async fn load_snapshot(&self, facility_id: Uuid) -> RecordsResult<FacilitySnapshot> {
        self.inner.load_snapshot(facility_id).await
    }

    async fn insert_tenant(&self, facility_id: Uuid, tenant: &TenantRecord) -> RecordsResult<()> {
        if tenant.name == self.refuse_name {
            self.refused.fetch_add(1, Ordering::SeqCst);
            return Err(RecordsError::backend("write rejected by storage"));
        }
        self.inner.insert_tenant(facility_id, tenant).await
    }

    async fn update_tenant(
        &self,
        facility_id: Uuid,
        key: &str,
        tenant: &TenantRecord,
    ) -> RecordsResult<()> {
        self.inner.update_tenant(facility_id, key, tenant).await
    }

    async fn delete_tenant(&self, facility_id: Uuid, key: &str) -> RecordsResult<()> {
        self.inner.delete_tenant(facility_id, key).await
    }

    async fn insert_unit(&self, facility_id: Uuid, unit: &UnitRecord) -> RecordsResult<()> {
        self.inner.insert_unit(facility_id, unit).await
    }

    async fn update_unit(
        &self,
        facility_id: Uuid,
        key: &str,
        unit: &UnitRecord,
    ) -> RecordsResult<()> {
        self.inner.update_unit(facility_id, key, unit).await
    }

    async fn delete_unit(&self, facility_id: Uuid, key: &str) -> RecordsResult<()> {
        self.inner.delete_unit(facility_id, key).await
    }

    async fn assign_unit(
        &self,
        facility_id: Uuid,
        unit_number: &str,
        tenant_key: Option<&str>,
    ) -> RecordsResult<()> {
        self.inner.assign_unit(facility_id, unit_number, tenant_key).await
    }
}
