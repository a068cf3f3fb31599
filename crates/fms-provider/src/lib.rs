//! # FMS Provider Framework
//!
//! Abstractions for reading tenant and unit data out of an external
//! Facility Management System (FMS).
//!
//! ## Architecture
//!
//! - [`FmsProvider`](traits::FmsProvider) - Capability trait every vendor adapter implements
//! - [`ProviderRegistry`](registry::ProviderRegistry) - Resolves a provider type to an instance
//! - [`RetryExecutor`](resilience::RetryExecutor) - Exponential backoff for transient failures
//! - [`SimulatedProvider`](simulated::SimulatedProvider) - Fixture-backed provider for tests and demos
//!
//! ## Example
//!
//! ```ignore
//! use fms_provider::prelude::*;
//!
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create(&ProviderConfig::simulated())?;
//!
//! provider.test_connection().await?;
//! let snapshot = provider.fetch_snapshot(facility_id).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`types`] - Provider types and snapshot records
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - Provider capability trait
//! - [`config`] - Provider configuration
//! - [`registry`] - Provider factories
//! - [`resilience`] - Retry with backoff
//! - [`simulated`] - Simulated provider

pub mod config;
pub mod error;
pub mod registry;
pub mod resilience;
pub mod simulated;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```
/// use fms_provider::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ProviderConfig;
    pub use crate::error::{ProviderError, ProviderResult};
    pub use crate::registry::{ProviderFactory, ProviderRegistry};
    pub use crate::resilience::{RetryConfig, RetryExecutor};
    pub use crate::simulated::{FailureMode, SimulatedProvider};
    pub use crate::traits::FmsProvider;
    pub use crate::types::{
        FacilitySnapshot, ProviderType, TenantRecord, UnitRecord, UnitStatus,
    };
}

// Re-export async_trait for provider implementors
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _registry = ProviderRegistry::with_defaults();
        let _config = ProviderConfig::simulated();
        let _retry = RetryExecutor::new(RetryConfig::none());
        let _tenant = TenantRecord::new("Jane Doe").with_unit("B12");
        let _unit = UnitRecord::new("B12", UnitStatus::Occupied);
        let _mode = FailureMode::Connection;
    }
}
