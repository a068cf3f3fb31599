//! Internal tenant/unit records seam.
//!
//! The engine reads the facility's current state through [`FacilityRecords`]
//! and writes applied changes back through it. Records are addressed by their
//! sync key (see [`TenantRecord::key`]).

use async_trait::async_trait;
use fms_provider::types::{normalize, FacilitySnapshot, TenantRecord, UnitRecord, UnitStatus};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::EntityType;

/// Errors raised by the internal records backend.
#[derive(Debug, Error)]
pub enum RecordsError {
    /// Target record does not exist.
    #[error("{entity} {key} not found")]
    NotFound { entity: EntityType, key: String },

    /// A record with the same key already exists.
    #[error("{entity} {key} already exists")]
    Conflict { entity: EntityType, key: String },

    /// Backend failure.
    #[error("records backend error: {message}")]
    Backend { message: String },
}

impl RecordsError {
    /// Create a not found error.
    pub fn not_found(entity: EntityType, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(entity: EntityType, key: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            key: key.into(),
        }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Result type for records operations.
pub type RecordsResult<T> = Result<T, RecordsError>;

/// Facility tenant/unit persistence used by the sync engine.
#[async_trait]
pub trait FacilityRecords: Send + Sync {
    /// Current internal state of the facility.
    async fn load_snapshot(&self, facility_id: Uuid) -> RecordsResult<FacilitySnapshot>;

    async fn insert_tenant(&self, facility_id: Uuid, tenant: &TenantRecord) -> RecordsResult<()>;

    /// Replace the tenant stored under `key`.
    async fn update_tenant(
        &self,
        facility_id: Uuid,
        key: &str,
        tenant: &TenantRecord,
    ) -> RecordsResult<()>;

    async fn delete_tenant(&self, facility_id: Uuid, key: &str) -> RecordsResult<()>;

    async fn insert_unit(&self, facility_id: Uuid, unit: &UnitRecord) -> RecordsResult<()>;

    /// Replace the unit stored under `key`.
    async fn update_unit(&self, facility_id: Uuid, key: &str, unit: &UnitRecord)
        -> RecordsResult<()>;

    async fn delete_unit(&self, facility_id: Uuid, key: &str) -> RecordsResult<()>;

    /// Assign a unit to a tenant, or release it with `None`.
    ///
    /// Assigning marks the unit occupied; releasing marks it vacant.
    async fn assign_unit(
        &self,
        facility_id: Uuid,
        unit_number: &str,
        tenant_key: Option<&str>,
    ) -> RecordsResult<()>;
}

/// In-memory facility records.
#[derive(Debug, Default)]
pub struct InMemoryFacilityRecords {
    facilities: RwLock<HashMap<Uuid, FacilitySnapshot>>,
}

impl InMemoryFacilityRecords {
    /// Create empty records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the state of one facility.
    pub async fn seed(&self, facility_id: Uuid, snapshot: FacilitySnapshot) {
        self.facilities.write().await.insert(facility_id, snapshot);
    }
}

#[async_trait]
impl FacilityRecords for InMemoryFacilityRecords {
    async fn load_snapshot(&self, facility_id: Uuid) -> RecordsResult<FacilitySnapshot> {
        Ok(self
            .facilities
            .read()
            .await
            .get(&facility_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_tenant(&self, facility_id: Uuid, tenant: &TenantRecord) -> RecordsResult<()> {
        let mut facilities = self.facilities.write().await;
        let snapshot = facilities.entry(facility_id).or_default();
        let key = tenant.key();
        if snapshot.tenants.iter().any(|t| t.key() == key) {
            return Err(RecordsError::conflict(EntityType::Tenant, key));
        }
        snapshot.tenants.push(tenant.clone());
        Ok(())
    }

    async fn update_tenant(
        &self,
        facility_id: Uuid,
        key: &str,
        tenant: &TenantRecord,
    ) -> RecordsResult<()> {
        let mut facilities = self.facilities.write().await;
        let snapshot = facilities
            .get_mut(&facility_id)
            .ok_or_else(|| RecordsError::not_found(EntityType::Tenant, key))?;
        let existing = snapshot
            .tenants
            .iter_mut()
            .find(|t| t.key() == key)
            .ok_or_else(|| RecordsError::not_found(EntityType::Tenant, key))?;
        *existing = tenant.clone();

        // Linking a tenant changes its key; keep unit assignments pointing at it.
        let new_key = tenant.key();
        if new_key != key {
            for unit in &mut snapshot.units {
                if unit.tenant_key.as_deref() == Some(key) {
                    unit.tenant_key = Some(new_key.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete_tenant(&self, facility_id: Uuid, key: &str) -> RecordsResult<()> {
        let mut facilities = self.facilities.write().await;
        let snapshot = facilities
            .get_mut(&facility_id)
            .ok_or_else(|| RecordsError::not_found(EntityType::Tenant, key))?;
        let before = snapshot.tenants.len();
        snapshot.tenants.retain(|t| t.key() != key);
        if snapshot.tenants.len() == before {
            return Err(RecordsError::not_found(EntityType::Tenant, key));
        }
        Ok(())
    }

    async fn insert_unit(&self, facility_id: Uuid, unit: &UnitRecord) -> RecordsResult<()> {
        let mut facilities = self.facilities.write().await;
        let snapshot = facilities.entry(facility_id).or_default();
        if snapshot.unit(&unit.unit_number).is_some() {
            return Err(RecordsError::conflict(EntityType::Unit, unit.key()));
        }
        snapshot.units.push(unit.clone());
        Ok(())
    }

    async fn update_unit(
        &self,
        facility_id: Uuid,
        key: &str,
        unit: &UnitRecord,
    ) -> RecordsResult<()> {
        let mut facilities = self.facilities.write().await;
        let existing = facilities
            .get_mut(&facility_id)
            .and_then(|s| s.units.iter_mut().find(|u| u.key() == key))
            .ok_or_else(|| RecordsError::not_found(EntityType::Unit, key))?;
        *existing = unit.clone();
        Ok(())
    }

    async fn delete_unit(&self, facility_id: Uuid, key: &str) -> RecordsResult<()> {
        let mut facilities = self.facilities.write().await;
        let snapshot = facilities
            .get_mut(&facility_id)
            .ok_or_else(|| RecordsError::not_found(EntityType::Unit, key))?;
        let before = snapshot.units.len();
        snapshot.units.retain(|u| u.key() != key);
        if snapshot.units.len() == before {
            return Err(RecordsError::not_found(EntityType::Unit, key));
        }
        Ok(())
    }

    async fn assign_unit(
        &self,
        facility_id: Uuid,
        unit_number: &str,
        tenant_key: Option<&str>,
    ) -> RecordsResult<()> {
        let wanted = normalize(unit_number);
        let mut facilities = self.facilities.write().await;
        let unit = facilities
            .get_mut(&facility_id)
            .and_then(|s| s.units.iter_mut().find(|u| u.natural_key() == wanted))
            .ok_or_else(|| RecordsError::not_found(EntityType::Unit, unit_number))?;

        unit.tenant_key = tenant_key.map(str::to_string);
        unit.status = if tenant_key.is_some() {
            UnitStatus::Occupied
        } else {
            UnitStatus::Vacant
        };
        Ok(())
    }
}
