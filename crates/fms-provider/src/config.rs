//! Provider configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};
use crate::types::ProviderType;

/// Configuration handed to a provider factory.
///
/// `settings` is opaque to the engine; each adapter validates its own keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which adapter to build.
    pub provider_type: ProviderType,
    /// Provider-specific settings (endpoints, credentials, fixtures).
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
}

fn empty_settings() -> serde_json::Value {
    serde_json::json!({})
}

impl ProviderConfig {
    /// Create a configuration with empty settings.
    #[must_use]
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            settings: empty_settings(),
        }
    }

    /// Replace the settings object.
    #[must_use]
    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    /// Configuration for the simulated provider.
    #[must_use]
    pub fn simulated() -> Self {
        Self::new(ProviderType::Simulated)
    }

    /// Check that settings are a JSON object.
    pub fn validate(&self) -> ProviderResult<()> {
        if !self.settings.is_object() {
            return Err(ProviderError::invalid_config(
                "Provider settings must be a JSON object",
            ));
        }
        Ok(())
    }

    /// Read a string setting.
    #[must_use]
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(serde_json::Value::as_str)
    }

    /// Read an unsigned integer setting.
    #[must_use]
    pub fn setting_u64(&self, key: &str) -> Option<u64> {
        self.settings.get(key).and_then(serde_json::Value::as_u64)
    }

    /// Read a boolean setting.
    #[must_use]
    pub fn setting_bool(&self, key: &str) -> Option<bool> {
        self.settings.get(key).and_then(serde_json::Value::as_bool)
    }
}
