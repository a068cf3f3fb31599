//! Provider registry.
//!
//! Maps a [`ProviderType`] to a factory that builds a provider instance from
//! a [`ProviderConfig`]. The engine resolves providers here and never knows
//! which vendor it is talking to.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::simulated::SimulatedProvider;
use crate::traits::FmsProvider;
use crate::types::ProviderType;

/// Builds a provider instance from its configuration.
pub type ProviderFactory =
    Arc<dyn Fn(&ProviderConfig) -> ProviderResult<Arc<dyn FmsProvider>> + Send + Sync>;

/// Registry of provider factories keyed by provider type.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<ProviderType, ProviderFactory>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("registered", &self.registered_types())
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in simulated provider registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderType::Simulated, |config| {
            Ok(Arc::new(SimulatedProvider::from_config(config)?) as Arc<dyn FmsProvider>)
        });
        registry
    }

    /// Register a factory, replacing any previous one for the same type.
    pub fn register<F>(&mut self, provider_type: ProviderType, factory: F)
    where
        F: Fn(&ProviderConfig) -> ProviderResult<Arc<dyn FmsProvider>> + Send + Sync + 'static,
    {
        debug!(provider_type = %provider_type, "Registering FMS provider");
        self.factories.insert(provider_type, Arc::new(factory));
    }

    /// Register a single shared instance for a provider type.
    pub fn register_instance(&mut self, provider_type: ProviderType, provider: Arc<dyn FmsProvider>) {
        self.register(provider_type, move |_| Ok(provider.clone()));
    }

    /// Check whether a factory exists for the type.
    #[must_use]
    pub fn is_registered(&self, provider_type: &ProviderType) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// All registered provider types, sorted by name.
    #[must_use]
    pub fn registered_types(&self) -> Vec<ProviderType> {
        let mut types: Vec<_> = self.factories.keys().cloned().collect();
        types.sort_by_key(ToString::to_string);
        types
    }

    /// Build a provider for the configuration.
    pub fn create(&self, config: &ProviderConfig) -> ProviderResult<Arc<dyn FmsProvider>> {
        let factory = self.factories.get(&config.provider_type).ok_or_else(|| {
            ProviderError::UnsupportedProvider {
                provider_type: config.provider_type.to_string(),
            }
        })?;
        factory(config)
    }

    /// Build the provider and probe its connection.
    ///
    /// Returns `false` for any failure, including unknown provider types.
    pub async fn test_connection(&self, config: &ProviderConfig) -> bool {
        let provider = match self.create(config) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(provider_type = %config.provider_type, error = %e, "Cannot build FMS provider");
                return false;
            }
        };

        match provider.test_connection().await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    provider_type = %config.provider_type,
                    error_code = e.error_code(),
                    error = %e,
                    "FMS connection test failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_defaults_registers_simulated() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.is_registered(&ProviderType::Simulated));
        assert!(!registry.is_registered(&ProviderType::SiteLink));
        assert_eq!(registry.registered_types(), vec![ProviderType::Simulated]);
    }

    #[test]
    fn test_create_unknown_type() {
        let registry = ProviderRegistry::with_defaults();
        let result = registry.create(&ProviderConfig::new(ProviderType::StorEdge));
        assert!(matches!(
            result,
            Err(ProviderError::UnsupportedProvider { ref provider_type }) if provider_type == "storedge"
        ));
    }

    #[test]
    fn test_register_custom_provider() {
        let mut registry = ProviderRegistry::new();
        let custom = ProviderType::Custom("acme".to_string());
        registry.register_instance(custom.clone(), Arc::new(SimulatedProvider::demo()));

        let provider = registry.create(&ProviderConfig::new(custom)).unwrap();
        assert_eq!(provider.display_name(), "Simulated FMS");
    }

    #[tokio::test]
    async fn test_test_connection() {
        let registry = ProviderRegistry::with_defaults();

        assert!(registry.test_connection(&ProviderConfig::simulated()).await);

        let rejecting = ProviderConfig::simulated()
            .with_settings(serde_json::json!({"reject_connection": true}));
        assert!(!registry.test_connection(&rejecting).await);

        assert!(
            !registry
                .test_connection(&ProviderConfig::new(ProviderType::SiteLink))
                .await
        );
    }
}
