//! Simulated FMS provider.
//!
//! Serves deterministic fixture data instead of calling a network. It honours
//! the full [`FmsProvider`] contract, including its failure modes, so the
//! engine can be exercised end to end in tests and demos.
//!
//! Recognised settings:
//!
//! | key                 | meaning                                              |
//! |---------------------|------------------------------------------------------|
//! | `fixture`           | snapshot object (`tenants`, `units`)                 |
//! | `fixture_raw`       | snapshot as a raw JSON string, parsed on every fetch |
//! | `latency_ms`        | delay applied to every fetch                         |
//! | `fail_first`        | number of fetches that fail before one succeeds      |
//! | `fail_always`       | every fetch fails                                    |
//! | `fail_with`         | `connection`, `timeout`, `rate_limited`, `auth`, `malformed` |
//! | `reject_connection` | `test_connection` reports invalid credentials        |

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::traits::FmsProvider;
use crate::types::{FacilitySnapshot, ProviderType, TenantRecord, UnitRecord, UnitStatus};

/// How an injected failure manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Connection refused (transient).
    Connection,
    /// Call timed out (transient).
    Timeout,
    /// Provider throttling (transient).
    RateLimited,
    /// Credentials rejected (permanent).
    Auth,
    /// Unparseable payload (permanent).
    Malformed,
}

impl FailureMode {
    fn to_error(self) -> ProviderError {
        match self {
            FailureMode::Connection => ProviderError::connection_failed("simulated connection refused"),
            FailureMode::Timeout => ProviderError::Timeout { timeout_secs: 1 },
            FailureMode::RateLimited => ProviderError::rate_limited(None),
            FailureMode::Auth => ProviderError::auth("simulated credentials rejected"),
            FailureMode::Malformed => ProviderError::malformed(
                "simulated payload is not a snapshot",
                Some("<html>502 Bad Gateway</html>".to_string()),
            ),
        }
    }
}

impl std::str::FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connection" => Ok(FailureMode::Connection),
            "timeout" => Ok(FailureMode::Timeout),
            "rate_limited" => Ok(FailureMode::RateLimited),
            "auth" => Ok(FailureMode::Auth),
            "malformed" => Ok(FailureMode::Malformed),
            _ => Err(format!("Unknown failure mode: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
enum Fixture {
    Parsed(FacilitySnapshot),
    Raw(String),
}

/// Fixture-backed provider.
#[derive(Debug)]
pub struct SimulatedProvider {
    name: String,
    fixture: Fixture,
    latency: Duration,
    fail_remaining: AtomicU64,
    fail_always: bool,
    failure_mode: FailureMode,
    reject_connection: bool,
    fetch_calls: AtomicU64,
}

impl SimulatedProvider {
    /// Create a provider serving the given snapshot.
    #[must_use]
    pub fn new(snapshot: FacilitySnapshot) -> Self {
        Self {
            name: "Simulated FMS".to_string(),
            fixture: Fixture::Parsed(snapshot),
            latency: Duration::ZERO,
            fail_remaining: AtomicU64::new(0),
            fail_always: false,
            failure_mode: FailureMode::Connection,
            reject_connection: false,
            fetch_calls: AtomicU64::new(0),
        }
    }

    /// Create a provider serving the built-in demo facility.
    #[must_use]
    pub fn demo() -> Self {
        Self::new(demo_snapshot())
    }

    /// Build from provider configuration.
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;

        let fixture = if let Some(raw) = config.setting_str("fixture_raw") {
            Fixture::Raw(raw.to_string())
        } else if let Some(value) = config.settings.get("fixture") {
            let snapshot = serde_json::from_value(value.clone()).map_err(|e| {
                ProviderError::invalid_config(format!("Invalid simulated fixture: {e}"))
            })?;
            Fixture::Parsed(snapshot)
        } else {
            Fixture::Parsed(demo_snapshot())
        };

        let failure_mode = match config.setting_str("fail_with") {
            Some(mode) => mode.parse().map_err(ProviderError::invalid_config)?,
            None => FailureMode::Connection,
        };

        let mut provider = Self {
            fixture,
            failure_mode,
            latency: Duration::from_millis(config.setting_u64("latency_ms").unwrap_or(0)),
            fail_always: config.setting_bool("fail_always").unwrap_or(false),
            reject_connection: config.setting_bool("reject_connection").unwrap_or(false),
            ..Self::new(FacilitySnapshot::default())
        };
        provider.fail_remaining = AtomicU64::new(config.setting_u64("fail_first").unwrap_or(0));
        if let Some(name) = config.setting_str("name") {
            provider.name = name.to_string();
        }
        Ok(provider)
    }

    /// Serve a raw payload that is parsed on every fetch.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            fixture: Fixture::Raw(raw.into()),
            ..Self::new(FacilitySnapshot::default())
        }
    }

    /// Delay every fetch.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `count` fetches with `mode`.
    #[must_use]
    pub fn with_failures(mut self, count: u64, mode: FailureMode) -> Self {
        self.fail_remaining = AtomicU64::new(count);
        self.failure_mode = mode;
        self
    }

    /// Fail every fetch with `mode`.
    #[must_use]
    pub fn failing_always(mut self, mode: FailureMode) -> Self {
        self.fail_always = true;
        self.failure_mode = mode;
        self
    }

    /// Make `test_connection` report rejected credentials.
    #[must_use]
    pub fn rejecting_connections(mut self) -> Self {
        self.reject_connection = true;
        self
    }

    /// Number of fetches served so far, failed ones included.
    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> ProviderResult<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_always {
            return Err(self.failure_mode.to_error());
        }
        let consumed = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            debug!(mode = ?self.failure_mode, "Simulated provider injecting failure");
            return Err(self.failure_mode.to_error());
        }
        Ok(())
    }

    fn snapshot(&self) -> ProviderResult<FacilitySnapshot> {
        match &self.fixture {
            Fixture::Parsed(snapshot) => Ok(snapshot.clone()),
            Fixture::Raw(raw) => serde_json::from_str(raw).map_err(|e| {
                ProviderError::malformed(format!("Snapshot payload rejected: {e}"), Some(raw.clone()))
            }),
        }
    }
}

#[async_trait]
impl FmsProvider for SimulatedProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Simulated
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    async fn test_connection(&self) -> ProviderResult<()> {
        if self.reject_connection {
            return Err(ProviderError::auth("simulated credentials rejected"));
        }
        Ok(())
    }

    async fn fetch_tenants(&self, _facility_id: Uuid) -> ProviderResult<Vec<TenantRecord>> {
        self.gate().await?;
        Ok(self.snapshot()?.tenants)
    }

    async fn fetch_units(&self, _facility_id: Uuid) -> ProviderResult<Vec<UnitRecord>> {
        self.gate().await?;
        Ok(self.snapshot()?.units)
    }

    async fn fetch_snapshot(&self, _facility_id: Uuid) -> ProviderResult<FacilitySnapshot> {
        // One simulated round trip per snapshot keeps `fail_first` counting whole attempts.
        self.gate().await?;
        self.snapshot()
    }
}

/// Small demo facility used when no fixture is configured.
#[must_use]
pub fn demo_snapshot() -> FacilitySnapshot {
    FacilitySnapshot::new(
        vec![
            TenantRecord::new("Jane Doe")
                .with_external_id("T-1001")
                .with_email("jane.doe@example.com")
                .with_phone("555-0101")
                .with_unit("B12"),
            TenantRecord::new("Carlos Rivera")
                .with_external_id("T-1002")
                .with_email("carlos.rivera@example.com")
                .with_unit("A1"),
        ],
        vec![
            UnitRecord::new("A1", UnitStatus::Occupied)
                .with_external_id("U-A1")
                .with_tenant("T-1002")
                .with_size("5x10")
                .with_rate_cents(8_900),
            UnitRecord::new("A3", UnitStatus::Vacant)
                .with_external_id("U-A3")
                .with_size("10x10")
                .with_rate_cents(12_900),
            UnitRecord::new("B12", UnitStatus::Occupied)
                .with_external_id("U-B12")
                .with_tenant("T-1001")
                .with_size("10x15")
                .with_rate_cents(15_900),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_fixture() {
        let provider = SimulatedProvider::demo();
        let snapshot = provider.fetch_snapshot(Uuid::new_v4()).await.unwrap();
        assert_eq!(snapshot, demo_snapshot());
        assert_eq!(provider.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_fail_first_then_succeed() {
        let provider = SimulatedProvider::demo().with_failures(2, FailureMode::RateLimited);
        let facility = Uuid::new_v4();

        assert!(matches!(
            provider.fetch_snapshot(facility).await,
            Err(ProviderError::RateLimited { .. })
        ));
        assert!(provider.fetch_snapshot(facility).await.is_err());
        assert!(provider.fetch_snapshot(facility).await.is_ok());
        assert_eq!(provider.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_raw_fixture_malformed() {
        let provider = SimulatedProvider::from_raw("{\"tenants\": [");
        let err = provider.fetch_snapshot(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
        assert_eq!(err.raw_payload(), Some("{\"tenants\": ["));
    }

    #[tokio::test]
    async fn test_rejecting_connections() {
        let provider = SimulatedProvider::demo().rejecting_connections();
        assert!(matches!(
            provider.test_connection().await,
            Err(ProviderError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = ProviderConfig::simulated().with_settings(serde_json::json!({
            "name": "Lakeside FMS",
            "fixture": {
                "tenants": [{"name": "Jane Doe", "unit_number": "B12"}],
                "units": [{"unit_number": "B12", "status": "occupied"}]
            },
            "fail_first": 1,
            "fail_with": "connection"
        }));

        let provider = SimulatedProvider::from_config(&config).unwrap();
        assert_eq!(provider.display_name(), "Lakeside FMS");
        assert!(provider.fetch_snapshot(Uuid::new_v4()).await.is_err());
        let snapshot = provider.fetch_snapshot(Uuid::new_v4()).await.unwrap();
        assert_eq!(snapshot.tenants[0].name, "Jane Doe");
    }

    #[test]
    fn test_from_config_rejects_bad_fixture() {
        let config = ProviderConfig::simulated()
            .with_settings(serde_json::json!({"fixture": {"tenants": "nope"}}));
        assert!(matches!(
            SimulatedProvider::from_config(&config),
            Err(ProviderError::InvalidConfiguration { .. })
        ));

        let config =
            ProviderConfig::simulated().with_settings(serde_json::json!({"fail_with": "gremlins"}));
        assert!(SimulatedProvider::from_config(&config).is_err());
    }
}
