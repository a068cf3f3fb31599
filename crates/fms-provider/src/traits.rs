//! Provider capability trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ProviderResult;
use crate::types::{FacilitySnapshot, ProviderType, TenantRecord, UnitRecord};

/// Capability every Facility Management System adapter implements.
///
/// New vendors are added by implementing this trait and registering a
/// factory in the [`ProviderRegistry`](crate::registry::ProviderRegistry);
/// the sync engine never branches on the provider type.
#[async_trait]
pub trait FmsProvider: Send + Sync {
    /// Get the type of this provider.
    fn provider_type(&self) -> ProviderType;

    /// Get the display name for this provider instance.
    fn display_name(&self) -> &str;

    /// Check that the FMS is reachable and the credentials are accepted.
    async fn test_connection(&self) -> ProviderResult<()>;

    /// Fetch every tenant the FMS knows for the facility.
    async fn fetch_tenants(&self, facility_id: Uuid) -> ProviderResult<Vec<TenantRecord>>;

    /// Fetch every unit the FMS knows for the facility.
    async fn fetch_units(&self, facility_id: Uuid) -> ProviderResult<Vec<UnitRecord>>;

    /// Fetch a full snapshot.
    ///
    /// Tenants and units are requested concurrently; the snapshot is only
    /// returned once both sides have answered.
    async fn fetch_snapshot(&self, facility_id: Uuid) -> ProviderResult<FacilitySnapshot> {
        let (tenants, units) = futures::try_join!(
            self.fetch_tenants(facility_id),
            self.fetch_units(facility_id)
        )?;
        Ok(FacilitySnapshot::new(tenants, units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::types::UnitStatus;

    struct StaticProvider {
        fail_units: bool,
    }

    #[async_trait]
    impl FmsProvider for StaticProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Custom("static".to_string())
        }

        fn display_name(&self) -> &str {
            "static"
        }

        async fn test_connection(&self) -> ProviderResult<()> {
            Ok(())
        }

        async fn fetch_tenants(&self, _facility_id: Uuid) -> ProviderResult<Vec<TenantRecord>> {
            Ok(vec![TenantRecord::new("Jane Doe").with_unit("B12")])
        }

        async fn fetch_units(&self, _facility_id: Uuid) -> ProviderResult<Vec<UnitRecord>> {
            if self.fail_units {
                return Err(ProviderError::connection_failed("units endpoint down"));
            }
            Ok(vec![UnitRecord::new("B12", UnitStatus::Occupied)])
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot_joins_both_sides() {
        let provider = StaticProvider { fail_units: false };
        let snapshot = provider.fetch_snapshot(Uuid::new_v4()).await.unwrap();
        assert_eq!(snapshot.tenants.len(), 1);
        assert_eq!(snapshot.units.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_snapshot_fails_if_either_side_fails() {
        let provider = StaticProvider { fail_units: true };
        let err = provider.fetch_snapshot(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
