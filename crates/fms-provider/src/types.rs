//! Provider types and snapshot records.
//!
//! The same record shapes describe both the external FMS snapshot and the
//! facility's internal tenant/unit state, so the change detector can diff
//! them field by field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix used for keys derived from a natural key instead of an external id.
pub const NATURAL_KEY_PREFIX: &str = "natural:";

/// Type of Facility Management System behind a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProviderType {
    /// Deterministic fixture-backed provider.
    Simulated,
    /// SiteLink web edition.
    SiteLink,
    /// storEDGE.
    StorEdge,
    /// Any other vendor, identified by name.
    Custom(String),
}

impl ProviderType {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ProviderType::Simulated => "simulated",
            ProviderType::SiteLink => "sitelink",
            ProviderType::StorEdge => "storedge",
            ProviderType::Custom(name) => name,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Custom(name) => write!(f, "custom:{name}"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "simulated" => Ok(ProviderType::Simulated),
            "sitelink" => Ok(ProviderType::SiteLink),
            "storedge" => Ok(ProviderType::StorEdge),
            "" => Err("Provider type must not be empty".to_string()),
            other => {
                let name = other.strip_prefix("custom:").unwrap_or(other).trim();
                if name.is_empty() {
                    Err(format!("Unknown provider type: {s}"))
                } else {
                    Ok(ProviderType::Custom(name.to_string()))
                }
            }
        }
    }
}

impl From<ProviderType> for String {
    fn from(value: ProviderType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ProviderType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Rental status of a storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Available to rent.
    Vacant,
    /// Rented by a tenant.
    Occupied,
    /// Held for an upcoming move-in.
    Reserved,
    /// Out of service.
    Unavailable,
}

impl UnitStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Vacant => "vacant",
            UnitStatus::Occupied => "occupied",
            UnitStatus::Reserved => "reserved",
            UnitStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vacant" | "available" => Ok(UnitStatus::Vacant),
            "occupied" | "rented" => Ok(UnitStatus::Occupied),
            "reserved" => Ok(UnitStatus::Reserved),
            "unavailable" => Ok(UnitStatus::Unavailable),
            _ => Err(format!("Unknown unit status: {s}")),
        }
    }
}

/// A tenant as known to one side of the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    /// Identifier assigned by the FMS, absent for records never linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Contact phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Unit the tenant rents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_number: Option<String>,
}

impl TenantRecord {
    /// Create a tenant with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            external_id: None,
            name: name.into(),
            email: None,
            phone: None,
            unit_number: None,
        }
    }

    /// Set the external id.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Set the contact email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the contact phone.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Set the rented unit.
    #[must_use]
    pub fn with_unit(mut self, unit_number: impl Into<String>) -> Self {
        self.unit_number = Some(unit_number.into());
        self
    }

    /// Natural key: lowercase email, falling back to the normalized name.
    #[must_use]
    pub fn natural_key(&self) -> String {
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_lowercase(),
            _ => normalize(&self.name),
        }
    }

    /// Sync key: external id when present, natural key otherwise.
    #[must_use]
    pub fn key(&self) -> String {
        sync_key(self.external_id.as_deref(), || self.natural_key())
    }

    /// Linked records carry an external id.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        has_external_id(self.external_id.as_deref())
    }
}

/// A storage unit as known to one side of the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Identifier assigned by the FMS, absent for records never linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Unit number painted on the door, e.g. `B12`.
    pub unit_number: String,
    /// Rental status.
    pub status: UnitStatus,
    /// Sync key of the assigned tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_key: Option<String>,
    /// Size label, e.g. `10x10`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Monthly street rate in cents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rate_cents: Option<i64>,
}

impl UnitRecord {
    /// Create a unit with a number and status.
    pub fn new(unit_number: impl Into<String>, status: UnitStatus) -> Self {
        Self {
            external_id: None,
            unit_number: unit_number.into(),
            status,
            tenant_key: None,
            size: None,
            monthly_rate_cents: None,
        }
    }

    /// Set the external id.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Assign a tenant by sync key; marks the unit occupied.
    #[must_use]
    pub fn with_tenant(mut self, tenant_key: impl Into<String>) -> Self {
        self.tenant_key = Some(tenant_key.into());
        self.status = UnitStatus::Occupied;
        self
    }

    /// Set the size label.
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Set the monthly rate.
    #[must_use]
    pub fn with_rate_cents(mut self, cents: i64) -> Self {
        self.monthly_rate_cents = Some(cents);
        self
    }

    /// Natural key: normalized unit number.
    #[must_use]
    pub fn natural_key(&self) -> String {
        normalize(&self.unit_number)
    }

    /// Sync key: external id when present, natural key otherwise.
    #[must_use]
    pub fn key(&self) -> String {
        sync_key(self.external_id.as_deref(), || self.natural_key())
    }

    /// Linked records carry an external id.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        has_external_id(self.external_id.as_deref())
    }
}

/// Full tenant/unit snapshot of one facility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilitySnapshot {
    /// Tenants.
    #[serde(default)]
    pub tenants: Vec<TenantRecord>,
    /// Units.
    #[serde(default)]
    pub units: Vec<UnitRecord>,
}

impl FacilitySnapshot {
    /// Create a snapshot from tenants and units.
    #[must_use]
    pub fn new(tenants: Vec<TenantRecord>, units: Vec<UnitRecord>) -> Self {
        Self { tenants, units }
    }

    /// Check if the snapshot holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty() && self.units.is_empty()
    }

    /// Find a unit by unit number (case-insensitive).
    #[must_use]
    pub fn unit(&self, unit_number: &str) -> Option<&UnitRecord> {
        let wanted = normalize(unit_number);
        self.units.iter().find(|u| u.natural_key() == wanted)
    }

    /// Find a tenant by sync key.
    #[must_use]
    pub fn tenant(&self, key: &str) -> Option<&TenantRecord> {
        self.tenants.iter().find(|t| t.key() == key)
    }
}

/// Lowercase and collapse whitespace.
#[must_use]
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn has_external_id(external_id: Option<&str>) -> bool {
    external_id.is_some_and(|id| !id.trim().is_empty())
}

fn sync_key(external_id: Option<&str>, natural: impl FnOnce() -> String) -> String {
    match external_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("{NATURAL_KEY_PREFIX}{}", natural()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parse() {
        assert_eq!("simulated".parse::<ProviderType>(), Ok(ProviderType::Simulated));
        assert_eq!("SiteLink".parse::<ProviderType>(), Ok(ProviderType::SiteLink));
        assert_eq!(
            "custom:acme".parse::<ProviderType>(),
            Ok(ProviderType::Custom("acme".to_string()))
        );
        assert_eq!(
            "acme".parse::<ProviderType>(),
            Ok(ProviderType::Custom("acme".to_string()))
        );
        assert!("".parse::<ProviderType>().is_err());
        assert!("custom:".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_provider_type_serde() {
        let json = serde_json::to_string(&ProviderType::Custom("acme".to_string())).unwrap();
        assert_eq!(json, "\"custom:acme\"");
        let parsed: ProviderType = serde_json::from_str("\"storedge\"").unwrap();
        assert_eq!(parsed, ProviderType::StorEdge);
    }

    #[test]
    fn test_tenant_keys() {
        let linked = TenantRecord::new("Jane Doe").with_external_id("T-100");
        assert_eq!(linked.key(), "T-100");
        assert!(linked.is_linked());

        let by_email = TenantRecord::new("Jane Doe").with_email(" Jane@Example.com ");
        assert_eq!(by_email.key(), "natural:jane@example.com");

        let by_name = TenantRecord::new("  Jane   Doe ");
        assert_eq!(by_name.key(), "natural:jane doe");
        assert!(!by_name.is_linked());

        let blank_id = TenantRecord::new("Jane Doe").with_external_id("  ");
        assert!(!blank_id.is_linked());
        assert_eq!(blank_id.key(), "natural:jane doe");
    }

    #[test]
    fn test_unit_keys_and_lookup() {
        let snapshot = FacilitySnapshot::new(
            vec![],
            vec![UnitRecord::new("B12", UnitStatus::Vacant)],
        );
        assert_eq!(snapshot.units[0].key(), "natural:b12");
        assert!(snapshot.unit("b12").is_some());
        assert!(snapshot.unit("A3").is_none());
    }

    #[test]
    fn test_unit_with_tenant_marks_occupied() {
        let unit = UnitRecord::new("A3", UnitStatus::Vacant).with_tenant("T-1");
        assert_eq!(unit.status, UnitStatus::Occupied);
        assert_eq!(unit.tenant_key.as_deref(), Some("T-1"));
    }

    #[test]
    fn test_unit_status_parse() {
        assert_eq!("rented".parse::<UnitStatus>(), Ok(UnitStatus::Occupied));
        assert_eq!("Vacant".parse::<UnitStatus>(), Ok(UnitStatus::Vacant));
        assert!("gone".parse::<UnitStatus>().is_err());
    }
}
