//! Change applier.
//!
//! Writes one approved change at a time into the facility's internal records.
//! A failure is captured as that change's outcome and never stops the caller
//! from applying the next one.

use fms_provider::types::{normalize, FacilitySnapshot, TenantRecord, UnitRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::SyncChange;
use crate::records::{FacilityRecords, RecordsError};
use crate::types::{ChangeType, EntityType};

/// Outcome of handling one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Written to internal records.
    Applied,
    /// Rejected by a reviewer; nothing written.
    Rejected,
    /// Apply failed; the message is recorded on the change.
    Error(String),
}

impl ApplyOutcome {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyOutcome::Applied => "applied",
            ApplyOutcome::Rejected => "rejected",
            ApplyOutcome::Error(_) => "error",
        }
    }

    /// Check if the change was written.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyOutcome::Error(message) => write!(f, "error: {message}"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ApplyError {
    #[error(transparent)]
    Records(#[from] RecordsError),
    #[error("change payload is invalid: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("change payload is missing {0} data")]
    MissingData(&'static str),
}

/// Applies reviewed changes to facility records.
#[derive(Clone)]
pub struct ChangeApplier {
    records: Arc<dyn FacilityRecords>,
}

impl ChangeApplier {
    /// Create an applier over the given records backend.
    pub fn new(records: Arc<dyn FacilityRecords>) -> Self {
        Self { records }
    }

    /// Handle a single change.
    ///
    /// Rejected changes are reported as [`ApplyOutcome::Rejected`] without
    /// touching records. Changes that have not been approved are refused.
    pub async fn apply(&self, facility_id: Uuid, change: &SyncChange) -> ApplyOutcome {
        if change.is_rejected() {
            return ApplyOutcome::Rejected;
        }
        if !change.is_approved() {
            return ApplyOutcome::Error("change has not been approved".to_string());
        }

        match self.write(facility_id, change).await {
            Ok(()) => {
                debug!(
                    change_id = %change.id,
                    change_type = %change.change_type,
                    entity_key = %change.entity_key,
                    "Change applied"
                );
                ApplyOutcome::Applied
            }
            Err(e) => {
                warn!(
                    change_id = %change.id,
                    change_type = %change.change_type,
                    entity_key = %change.entity_key,
                    error = %e,
                    "Change could not be applied"
                );
                ApplyOutcome::Error(e.to_string())
            }
        }
    }

    /// Write one change.
    ///
    /// Every record a change touches is checked before its first write, so a
    /// failed change leaves the records as they were.
    async fn write(&self, facility_id: Uuid, change: &SyncChange) -> Result<(), ApplyError> {
        let records = &self.records;
        let key = change.entity_key.as_str();
        let current = records.load_snapshot(facility_id).await?;

        match change.change_type {
            ChangeType::TenantAdded => {
                let tenant: TenantRecord = after(change)?;
                let unit = tenant
                    .unit_number
                    .as_deref()
                    .map(|u| require_unit(&current, u))
                    .transpose()?;
                records.insert_tenant(facility_id, &tenant).await?;
                if let Some(unit) = unit {
                    records
                        .assign_unit(facility_id, &unit.unit_number, Some(tenant.key().as_str()))
                        .await?;
                }
            }
            ChangeType::TenantRemoved => {
                let tenant: TenantRecord = before(change)?;
                require_tenant(&current, key)?;
                let release = tenant
                    .unit_number
                    .as_deref()
                    .and_then(|u| current.unit(u))
                    .filter(|u| held_by(u, key));
                records.delete_tenant(facility_id, key).await?;
                // A unit deleted or re-let meanwhile has nothing to release.
                if let Some(unit) = release {
                    records
                        .assign_unit(facility_id, &unit.unit_number, None)
                        .await?;
                }
            }
            ChangeType::TenantUpdated => {
                let old: TenantRecord = before(change)?;
                let new: TenantRecord = after(change)?;
                let target = merge_tenant(require_tenant(&current, key)?, &old, &new);

                let moved = old.unit_number.as_deref().map(normalize)
                    != new.unit_number.as_deref().map(normalize);
                let (release, assign) = if moved {
                    let release = old
                        .unit_number
                        .as_deref()
                        .and_then(|u| current.unit(u))
                        .filter(|u| held_by(u, key));
                    let assign = new
                        .unit_number
                        .as_deref()
                        .map(|u| require_unit(&current, u))
                        .transpose()?;
                    (release, assign)
                } else {
                    (None, None)
                };

                records.update_tenant(facility_id, key, &target).await?;
                if let Some(unit) = release {
                    records
                        .assign_unit(facility_id, &unit.unit_number, None)
                        .await?;
                }
                if let Some(unit) = assign {
                    records
                        .assign_unit(facility_id, &unit.unit_number, Some(target.key().as_str()))
                        .await?;
                }
            }
            ChangeType::UnitAdded => {
                let unit: UnitRecord = after(change)?;
                records.insert_unit(facility_id, &unit).await?;
            }
            ChangeType::UnitRemoved => {
                records.delete_unit(facility_id, key).await?;
            }
            ChangeType::UnitUpdated => {
                let old: UnitRecord = before(change)?;
                let new: UnitRecord = after(change)?;
                let stored = current
                    .units
                    .iter()
                    .find(|u| u.key() == key)
                    .ok_or_else(|| RecordsError::not_found(EntityType::Unit, key))?;
                records
                    .update_unit(facility_id, key, &merge_unit(stored, &old, &new))
                    .await?;
            }
        }
        Ok(())
    }
}

fn require_tenant<'a>(
    current: &'a FacilitySnapshot,
    key: &str,
) -> Result<&'a TenantRecord, RecordsError> {
    current
        .tenant(key)
        .ok_or_else(|| RecordsError::not_found(EntityType::Tenant, key))
}

fn require_unit<'a>(
    current: &'a FacilitySnapshot,
    unit_number: &str,
) -> Result<&'a UnitRecord, RecordsError> {
    current
        .unit(unit_number)
        .ok_or_else(|| RecordsError::not_found(EntityType::Unit, unit_number))
}

/// Unit is rented by `tenant_key`, or by nobody in particular.
fn held_by(unit: &UnitRecord, tenant_key: &str) -> bool {
    !matches!(unit.tenant_key.as_deref(), Some(k) if k != tenant_key)
}

/// Stored tenant with the fields that differ between `old` and `new` replaced.
fn merge_tenant(stored: &TenantRecord, old: &TenantRecord, new: &TenantRecord) -> TenantRecord {
    let mut merged = stored.clone();
    if old.external_id != new.external_id {
        merged.external_id.clone_from(&new.external_id);
    }
    if old.name != new.name {
        merged.name.clone_from(&new.name);
    }
    if old.email != new.email {
        merged.email.clone_from(&new.email);
    }
    if old.phone != new.phone {
        merged.phone.clone_from(&new.phone);
    }
    if old.unit_number != new.unit_number {
        merged.unit_number.clone_from(&new.unit_number);
    }
    merged
}

/// Stored unit with the fields that differ between `old` and `new` replaced.
fn merge_unit(stored: &UnitRecord, old: &UnitRecord, new: &UnitRecord) -> UnitRecord {
    let mut merged = stored.clone();
    if old.external_id != new.external_id {
        merged.external_id.clone_from(&new.external_id);
    }
    if old.status != new.status {
        merged.status = new.status;
    }
    if old.tenant_key != new.tenant_key {
        merged.tenant_key.clone_from(&new.tenant_key);
    }
    if old.size != new.size {
        merged.size.clone_from(&new.size);
    }
    if old.monthly_rate_cents != new.monthly_rate_cents {
        merged.monthly_rate_cents = new.monthly_rate_cents;
    }
    merged
}

fn before<T: DeserializeOwned>(change: &SyncChange) -> Result<T, ApplyError> {
    let data = change
        .before_data
        .clone()
        .ok_or(ApplyError::MissingData("before"))?;
    Ok(serde_json::from_value(data)?)
}

fn after<T: DeserializeOwned>(change: &SyncChange) -> Result<T, ApplyError> {
    if change.after_data.is_null() {
        return Err(ApplyError::MissingData("after"));
    }
    Ok(serde_json::from_value(change.after_data.clone())?)
}
