//! Change detection.
//!
//! Pure diff of an external FMS snapshot against the facility's internal
//! records. Both sides are keyed by external id, falling back to a natural key
//! (tenant email or name, unit number) for records that were never linked.
//!
//! Output order is the order changes must be applied in: new units first so
//! tenants can be assigned to them, then tenant changes, then unit updates and
//! removals. Within a phase changes are ordered by key, so the same input
//! always yields the same list.

use fms_provider::types::{normalize, FacilitySnapshot, TenantRecord, UnitRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::types::{ChangeType, EntityType};

/// Record carried in a change's before/after data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRecord {
    Tenant(TenantRecord),
    Unit(UnitRecord),
}

/// A change produced by the detector, before review classification.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedChange {
    pub change_type: ChangeType,
    pub external_id: Option<String>,
    /// Key of the internal record, or of the external one for additions.
    pub entity_key: String,
    /// Human label: tenant name or unit number.
    pub label: String,
    pub before: Option<EntityRecord>,
    pub after: Option<EntityRecord>,
    /// Tracked fields that differ (updates only).
    pub changed_fields: Vec<&'static str>,
    /// Moves a tenant between units or hands a unit to someone else.
    pub reassignment: bool,
    pub impact_summary: String,
    pub required_actions: Vec<String>,
}

impl DetectedChange {
    /// Entity the change targets.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.change_type.entity_type()
    }
}

/// Detector output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub changes: Vec<DetectedChange>,
    /// Input problems that did not stop detection, e.g. duplicate keys.
    pub warnings: Vec<String>,
}

impl Detection {
    /// Check if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Diff the external snapshot against internal state.
#[must_use]
pub fn detect_changes(external: &FacilitySnapshot, internal: &FacilitySnapshot) -> Detection {
    let mut warnings = Vec::new();

    let external_tenants = dedupe(&external.tenants, "tenant", &mut warnings);
    let external_units = dedupe(&external.units, "unit", &mut warnings);

    let tenants = pair(&external_tenants, &internal.tenants);
    let units = pair(&external_units, &internal.units);

    // Internal tenant key -> external tenant key, so unit assignments compare
    // equal even when the two sides key the same tenant differently.
    let tenant_aliases: HashMap<String, String> = tenants
        .matched
        .iter()
        .map(|(ext, int)| (int.key(), ext.key()))
        .collect();
    let alias = |key: Option<&str>| -> Option<String> {
        key.map(|k| tenant_aliases.get(k).cloned().unwrap_or_else(|| k.to_string()))
    };

    let mut changes = Vec::new();
    let mut covered_units = BTreeSet::new();

    for ext in &tenants.added {
        if let Some(unit) = ext.unit_number.as_deref() {
            covered_units.insert(normalize(unit));
        }
        let occupant = ext
            .unit_number
            .as_deref()
            .and_then(|u| internal.unit(u))
            .and_then(|u| alias(u.tenant_key.as_deref()));
        let reassignment = occupant.is_some_and(|k| k != ext.key());
        changes.push(tenant_added(ext, reassignment));
    }

    for int in &tenants.removed {
        if let Some(unit) = int.unit_number.as_deref() {
            covered_units.insert(normalize(unit));
        }
        changes.push(tenant_removed(int));
    }

    for (ext, int) in &tenants.matched {
        let fields = tenant_diff(int, ext);
        if fields.is_empty() {
            continue;
        }
        let mut reassignment = false;
        if fields.contains(&"unit_number") {
            for unit in [&int.unit_number, &ext.unit_number].into_iter().flatten() {
                covered_units.insert(normalize(unit));
            }
            reassignment = int.unit_number.is_some();
        }
        changes.push(tenant_updated(int, ext, fields, reassignment));
    }

    for ext in &units.added {
        changes.push(unit_added(ext));
    }

    for int in &units.removed {
        changes.push(unit_removed(int));
    }

    for (ext, int) in &units.matched {
        let internal_tenant = alias(int.tenant_key.as_deref());
        let mut fields = unit_diff(int, ext, internal_tenant.as_deref());
        let covered = covered_units.contains(&ext.natural_key());
        if covered {
            fields.retain(|f| !matches!(*f, "status" | "tenant_key"));
        }
        if fields.is_empty() {
            continue;
        }
        let reassignment = fields.contains(&"tenant_key") && internal_tenant.is_some();
        changes.push(unit_updated(int, ext, fields, reassignment));
    }

    changes.sort_by(|a, b| {
        apply_phase(a.change_type)
            .cmp(&apply_phase(b.change_type))
            .then_with(|| a.entity_key.cmp(&b.entity_key))
            .then_with(|| a.change_type.cmp(&b.change_type))
    });

    debug!(
        changes = changes.len(),
        warnings = warnings.len(),
        "Change detection finished"
    );

    Detection { changes, warnings }
}

fn apply_phase(change_type: ChangeType) -> u8 {
    match change_type {
        ChangeType::UnitAdded => 0,
        ChangeType::TenantAdded | ChangeType::TenantUpdated | ChangeType::TenantRemoved => 1,
        ChangeType::UnitUpdated | ChangeType::UnitRemoved => 2,
    }
}

trait Keyed {
    fn external_id(&self) -> Option<&str>;
    fn natural_key(&self) -> String;
    fn key(&self) -> String;
    fn is_linked(&self) -> bool;
}

impl Keyed for TenantRecord {
    fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref().map(str::trim)
    }
    fn natural_key(&self) -> String {
        TenantRecord::natural_key(self)
    }
    fn key(&self) -> String {
        TenantRecord::key(self)
    }
    fn is_linked(&self) -> bool {
        TenantRecord::is_linked(self)
    }
}

impl Keyed for UnitRecord {
    fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref().map(str::trim)
    }
    fn natural_key(&self) -> String {
        UnitRecord::natural_key(self)
    }
    fn key(&self) -> String {
        UnitRecord::key(self)
    }
    fn is_linked(&self) -> bool {
        UnitRecord::is_linked(self)
    }
}

fn dedupe<'a, T: Keyed>(records: &'a [T], kind: &str, warnings: &mut Vec<String>) -> Vec<&'a T> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter(|r| {
            let key = r.key();
            if seen.insert(key.clone()) {
                true
            } else {
                warnings.push(format!("Duplicate {kind} key {key} in FMS snapshot ignored"));
                false
            }
        })
        .collect()
}

struct Pairing<'a, T> {
    /// (external, internal)
    matched: Vec<(&'a T, &'a T)>,
    added: Vec<&'a T>,
    removed: Vec<&'a T>,
}

fn pair<'a, T: Keyed>(external: &[&'a T], internal: &'a [T]) -> Pairing<'a, T> {
    let mut used = vec![false; internal.len()];
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    let mut by_natural: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, record) in internal.iter().enumerate() {
        if record.is_linked() {
            if let Some(id) = record.external_id() {
                by_id.entry(id).or_insert(idx);
            }
        }
        by_natural.entry(record.natural_key()).or_default().push(idx);
    }

    let mut pairing = Pairing {
        matched: Vec::new(),
        added: Vec::new(),
        removed: Vec::new(),
    };

    for ext in external {
        let by_external_id = ext
            .is_linked()
            .then(|| ext.external_id().and_then(|id| by_id.get(id).copied()))
            .flatten()
            .filter(|idx| !used[*idx]);

        // Natural-key fallback never pairs two records linked to different FMS ids.
        let found = by_external_id.or_else(|| {
            by_natural.get(&ext.natural_key()).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .find(|idx| !used[*idx] && (!internal[*idx].is_linked() || !ext.is_linked()))
            })
        });

        match found {
            Some(idx) => {
                used[idx] = true;
                pairing.matched.push((*ext, &internal[idx]));
            }
            None => pairing.added.push(*ext),
        }
    }

    // Unlinked internal records the FMS never knew about are left alone.
    pairing.removed = internal
        .iter()
        .zip(used)
        .filter(|(record, used)| !used && record.is_linked())
        .map(|(record, _)| record)
        .collect();

    pairing
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn text_differs(a: Option<&str>, b: Option<&str>) -> bool {
    blank_to_none(a) != blank_to_none(b)
}

fn folded_differs(a: Option<&str>, b: Option<&str>) -> bool {
    blank_to_none(a).map(normalize) != blank_to_none(b).map(normalize)
}

fn tenant_diff(internal: &TenantRecord, external: &TenantRecord) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if text_differs(Some(&internal.name), Some(&external.name)) {
        fields.push("name");
    }
    if folded_differs(internal.email.as_deref(), external.email.as_deref()) {
        fields.push("email");
    }
    if text_differs(internal.phone.as_deref(), external.phone.as_deref()) {
        fields.push("phone");
    }
    if folded_differs(internal.unit_number.as_deref(), external.unit_number.as_deref()) {
        fields.push("unit_number");
    }
    fields
}

fn unit_diff(
    internal: &UnitRecord,
    external: &UnitRecord,
    internal_tenant: Option<&str>,
) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if internal.status != external.status {
        fields.push("status");
    }
    if text_differs(internal_tenant, external.tenant_key.as_deref()) {
        fields.push("tenant_key");
    }
    if folded_differs(internal.size.as_deref(), external.size.as_deref()) {
        fields.push("size");
    }
    if internal.monthly_rate_cents != external.monthly_rate_cents {
        fields.push("monthly_rate_cents");
    }
    fields
}

/// Internal tenant with only the changed fields taken from the FMS.
fn tenant_target(int: &TenantRecord, ext: &TenantRecord, fields: &[&str]) -> TenantRecord {
    let mut target = int.clone();
    if ext.is_linked() {
        target.external_id.clone_from(&ext.external_id);
    }
    for field in fields {
        match *field {
            "name" => target.name.clone_from(&ext.name),
            "email" => target.email.clone_from(&ext.email),
            "phone" => target.phone.clone_from(&ext.phone),
            "unit_number" => target.unit_number.clone_from(&ext.unit_number),
            _ => {}
        }
    }
    target
}

/// Internal unit with only the changed fields taken from the FMS.
///
/// Occupancy handled by a tenant change is not in `fields`, so it stays as it
/// is internally until that change is applied.
fn unit_target(int: &UnitRecord, ext: &UnitRecord, fields: &[&str]) -> UnitRecord {
    let mut target = int.clone();
    if ext.is_linked() {
        target.external_id.clone_from(&ext.external_id);
    }
    for field in fields {
        match *field {
            "status" => target.status = ext.status,
            "tenant_key" => target.tenant_key.clone_from(&ext.tenant_key),
            "size" => target.size.clone_from(&ext.size),
            "monthly_rate_cents" => target.monthly_rate_cents = ext.monthly_rate_cents,
            _ => {}
        }
    }
    target
}

/// Follow-up actions attached to a change, by change type.
#[must_use]
pub fn required_actions(change_type: ChangeType, reassignment: bool) -> Vec<String> {
    let base: &[&str] = match change_type {
        ChangeType::TenantAdded => &["create_tenant_record", "assign_unit"],
        ChangeType::TenantRemoved => &["verify_move_out", "release_unit", "archive_tenant_record"],
        ChangeType::TenantUpdated => &["update_tenant_record"],
        ChangeType::UnitAdded => &["create_unit_record"],
        ChangeType::UnitRemoved => &["verify_unit_decommissioned", "archive_unit_record"],
        ChangeType::UnitUpdated => &["update_unit_record"],
    };
    let mut actions: Vec<String> = base.iter().map(ToString::to_string).collect();
    if reassignment {
        actions.push("verify_unit_transfer".to_string());
    }
    actions
}

fn unit_phrase(unit: Option<&str>) -> String {
    unit.map_or_else(|| "no unit".to_string(), |u| format!("unit {u}"))
}

fn tenant_added(ext: &TenantRecord, reassignment: bool) -> DetectedChange {
    let mut impact = format!("New tenant {} will be created", ext.name);
    if let Some(unit) = ext.unit_number.as_deref() {
        impact.push_str(&format!(" and assigned to unit {unit}"));
        if reassignment {
            impact.push_str(", replacing its current tenant");
        }
    }
    DetectedChange {
        change_type: ChangeType::TenantAdded,
        external_id: ext.external_id.clone(),
        entity_key: ext.key(),
        label: ext.name.clone(),
        before: None,
        after: Some(EntityRecord::Tenant(ext.clone())),
        changed_fields: Vec::new(),
        reassignment,
        impact_summary: impact,
        required_actions: required_actions(ChangeType::TenantAdded, reassignment),
    }
}

fn tenant_removed(int: &TenantRecord) -> DetectedChange {
    let impact = match int.unit_number.as_deref() {
        Some(unit) => format!("Tenant {} will be removed and unit {unit} released", int.name),
        None => format!("Tenant {} will be removed", int.name),
    };
    DetectedChange {
        change_type: ChangeType::TenantRemoved,
        external_id: int.external_id.clone(),
        entity_key: int.key(),
        label: int.name.clone(),
        before: Some(EntityRecord::Tenant(int.clone())),
        after: None,
        changed_fields: Vec::new(),
        reassignment: false,
        impact_summary: impact,
        required_actions: required_actions(ChangeType::TenantRemoved, false),
    }
}

fn tenant_updated(
    int: &TenantRecord,
    ext: &TenantRecord,
    fields: Vec<&'static str>,
    reassignment: bool,
) -> DetectedChange {
    let impact = if fields.contains(&"unit_number") {
        format!(
            "Tenant {} moves from {} to {}",
            ext.name,
            unit_phrase(int.unit_number.as_deref()),
            unit_phrase(ext.unit_number.as_deref())
        )
    } else {
        format!("Tenant {}: {} will be updated", ext.name, fields.join(", "))
    };
    DetectedChange {
        change_type: ChangeType::TenantUpdated,
        external_id: ext.external_id.clone(),
        entity_key: int.key(),
        label: ext.name.clone(),
        before: Some(EntityRecord::Tenant(int.clone())),
        after: Some(EntityRecord::Tenant(tenant_target(int, ext, &fields))),
        changed_fields: fields,
        reassignment,
        impact_summary: impact,
        required_actions: required_actions(ChangeType::TenantUpdated, reassignment),
    }
}

fn unit_added(ext: &UnitRecord) -> DetectedChange {
    let size = ext
        .size
        .as_deref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default();
    DetectedChange {
        change_type: ChangeType::UnitAdded,
        external_id: ext.external_id.clone(),
        entity_key: ext.key(),
        label: ext.unit_number.clone(),
        before: None,
        after: Some(EntityRecord::Unit(ext.clone())),
        changed_fields: Vec::new(),
        reassignment: false,
        impact_summary: format!(
            "New unit {}{size} will be created as {}",
            ext.unit_number, ext.status
        ),
        required_actions: required_actions(ChangeType::UnitAdded, false),
    }
}

fn unit_removed(int: &UnitRecord) -> DetectedChange {
    DetectedChange {
        change_type: ChangeType::UnitRemoved,
        external_id: int.external_id.clone(),
        entity_key: int.key(),
        label: int.unit_number.clone(),
        before: Some(EntityRecord::Unit(int.clone())),
        after: None,
        changed_fields: Vec::new(),
        reassignment: false,
        impact_summary: format!("Unit {} will be removed from the facility", int.unit_number),
        required_actions: required_actions(ChangeType::UnitRemoved, false),
    }
}

fn unit_updated(
    int: &UnitRecord,
    ext: &UnitRecord,
    fields: Vec<&'static str>,
    reassignment: bool,
) -> DetectedChange {
    let impact = if reassignment {
        format!("Unit {} will be reassigned to a different tenant", ext.unit_number)
    } else {
        format!("Unit {}: {} will be updated", ext.unit_number, fields.join(", "))
    };
    DetectedChange {
        change_type: ChangeType::UnitUpdated,
        external_id: ext.external_id.clone(),
        entity_key: int.key(),
        label: ext.unit_number.clone(),
        before: Some(EntityRecord::Unit(int.clone())),
        after: Some(EntityRecord::Unit(unit_target(int, ext, &fields))),
        changed_fields: fields,
        reassignment,
        impact_summary: impact,
        required_actions: required_actions(ChangeType::UnitUpdated, reassignment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fms_provider::types::UnitStatus;

    fn facility() -> FacilitySnapshot {
        FacilitySnapshot::new(
            vec![
                TenantRecord::new("John Smith")
                    .with_external_id("T-1")
                    .with_email("john@example.com")
                    .with_unit("A3"),
                TenantRecord::new("Ada Park")
                    .with_external_id("T-2")
                    .with_unit("A1"),
            ],
            vec![
                UnitRecord::new("A1", UnitStatus::Occupied)
                    .with_external_id("U-A1")
                    .with_tenant("T-2"),
                UnitRecord::new("A3", UnitStatus::Occupied)
                    .with_external_id("U-A3")
                    .with_tenant("T-1"),
                UnitRecord::new("B12", UnitStatus::Vacant).with_external_id("U-B12"),
            ],
        )
    }

    fn types(detection: &Detection) -> Vec<ChangeType> {
        detection.changes.iter().map(|c| c.change_type).collect()
    }

    #[test]
    fn test_identical_snapshots_yield_nothing() {
        let snapshot = facility();
        assert!(detect_changes(&snapshot, &snapshot).is_empty());
        assert!(detect_changes(&snapshot, &snapshot).is_empty());
        assert!(detect_changes(&FacilitySnapshot::default(), &FacilitySnapshot::default()).is_empty());
    }

    #[test]
    fn test_tenant_added_to_vacant_unit() {
        let internal = facility();
        let mut external = facility();
        external.tenants.push(
            TenantRecord::new("Jane Doe")
                .with_external_id("T-3")
                .with_unit("B12"),
        );
        external.units[2] = UnitRecord::new("B12", UnitStatus::Occupied)
            .with_external_id("U-B12")
            .with_tenant("T-3");

        let detection = detect_changes(&external, &internal);
        assert_eq!(types(&detection), vec![ChangeType::TenantAdded]);

        let change = &detection.changes[0];
        assert!(!change.reassignment);
        assert_eq!(change.entity_key, "T-3");
        assert_eq!(
            change.impact_summary,
            "New tenant Jane Doe will be created and assigned to unit B12"
        );
    }

    #[test]
    fn test_tenant_removed_releases_unit_without_unit_change() {
        let internal = facility();
        let mut external = facility();
        external.tenants.remove(0);
        external.units[1] = UnitRecord::new("A3", UnitStatus::Vacant).with_external_id("U-A3");

        let detection = detect_changes(&external, &internal);
        assert_eq!(types(&detection), vec![ChangeType::TenantRemoved]);
        assert_eq!(detection.changes[0].external_id.as_deref(), Some("T-1"));
        assert!(detection.changes[0].after.is_none());
    }

    #[test]
    fn test_unlinked_internal_records_are_never_removed() {
        let internal = FacilitySnapshot::new(vec![TenantRecord::new("Walk In")], vec![]);
        let detection = detect_changes(&FacilitySnapshot::default(), &internal);
        assert!(detection.is_empty());
    }

    #[test]
    fn test_natural_key_fallback_matches_unlinked() {
        let internal = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_email("JANE@example.com")],
            vec![],
        );
        let external = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe")
                .with_external_id("T-9")
                .with_email("jane@example.com")
                .with_phone("555-0199")],
            vec![],
        );

        let detection = detect_changes(&external, &internal);
        assert_eq!(types(&detection), vec![ChangeType::TenantUpdated]);
        let change = &detection.changes[0];
        assert_eq!(change.changed_fields, vec!["phone"]);
        assert_eq!(change.entity_key, "natural:jane@example.com");
    }

    #[test]
    fn test_linked_records_with_different_ids_do_not_pair() {
        let internal = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_external_id("T-1")],
            vec![],
        );
        let external = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_external_id("T-2")],
            vec![],
        );

        let detection = detect_changes(&external, &internal);
        assert_eq!(
            types(&detection),
            vec![ChangeType::TenantAdded, ChangeType::TenantRemoved]
        );
    }

    #[test]
    fn test_tenant_move_is_reassignment() {
        let internal = facility();
        let mut external = facility();
        external.tenants[1].unit_number = Some("B12".to_string());
        external.units[0] = UnitRecord::new("A1", UnitStatus::Vacant).with_external_id("U-A1");
        external.units[2] = UnitRecord::new("B12", UnitStatus::Occupied)
            .with_external_id("U-B12")
            .with_tenant("T-2");

        let detection = detect_changes(&external, &internal);
        assert_eq!(types(&detection), vec![ChangeType::TenantUpdated]);
        let change = &detection.changes[0];
        assert!(change.reassignment);
        assert_eq!(change.impact_summary, "Tenant Ada Park moves from unit A1 to unit B12");
        assert!(change
            .required_actions
            .contains(&"verify_unit_transfer".to_string()));
    }

    #[test]
    fn test_unit_metadata_update() {
        let internal = facility();
        let mut external = facility();
        external.units[2].monthly_rate_cents = Some(13_500);
        external.units[2].size = Some("10x10".to_string());

        let detection = detect_changes(&external, &internal);
        assert_eq!(types(&detection), vec![ChangeType::UnitUpdated]);
        let change = &detection.changes[0];
        assert!(!change.reassignment);
        assert_eq!(change.changed_fields, vec!["size", "monthly_rate_cents"]);
    }

    #[test]
    fn test_covered_unit_update_keeps_internal_occupancy() {
        let internal = facility();
        let mut external = facility();
        external.tenants.remove(0);
        external.units[1] = UnitRecord::new("A3", UnitStatus::Vacant)
            .with_external_id("U-A3")
            .with_rate_cents(12_000);

        let detection = detect_changes(&external, &internal);
        assert_eq!(
            types(&detection),
            vec![ChangeType::TenantRemoved, ChangeType::UnitUpdated]
        );

        let update = &detection.changes[1];
        assert_eq!(update.changed_fields, vec!["monthly_rate_cents"]);
        let Some(EntityRecord::Unit(after)) = &update.after else {
            panic!("unit update without unit data");
        };
        assert_eq!(after.status, UnitStatus::Occupied);
        assert_eq!(after.tenant_key.as_deref(), Some("T-1"));
        assert_eq!(after.monthly_rate_cents, Some(12_000));
    }

    #[test]
    fn test_tenant_update_links_unlinked_record() {
        let internal = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_email("JANE@example.com")],
            vec![],
        );
        let external = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe")
                .with_external_id("T-9")
                .with_email("jane@example.com")
                .with_phone("555-0199")],
            vec![],
        );

        let detection = detect_changes(&external, &internal);
        let Some(EntityRecord::Tenant(after)) = &detection.changes[0].after else {
            panic!("tenant update without tenant data");
        };
        assert_eq!(after.external_id.as_deref(), Some("T-9"));
        assert_eq!(after.phone.as_deref(), Some("555-0199"));
        assert_eq!(after.email.as_deref(), Some("JANE@example.com"));
    }

    #[test]
    fn test_uncovered_unit_tenant_change_is_reassignment() {
        let internal = facility();
        let mut external = facility();
        external.units[0].tenant_key = Some("T-1".to_string());

        let detection = detect_changes(&external, &internal);
        assert_eq!(types(&detection), vec![ChangeType::UnitUpdated]);
        assert!(detection.changes[0].reassignment);
    }

    #[test]
    fn test_unit_tenant_keys_compare_through_aliases() {
        let internal = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_unit("B12")],
            vec![UnitRecord::new("B12", UnitStatus::Occupied).with_tenant("natural:jane doe")],
        );
        let external = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_unit("B12")],
            vec![UnitRecord::new("B12", UnitStatus::Occupied).with_tenant("natural:jane doe")],
        );
        assert!(detect_changes(&external, &internal).is_empty());

        let external = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_external_id("T-7").with_unit("B12")],
            vec![UnitRecord::new("B12", UnitStatus::Occupied).with_tenant("T-7")],
        );
        assert!(detect_changes(&external, &internal).is_empty());
    }

    #[test]
    fn test_apply_order() {
        let internal = facility();
        let external = FacilitySnapshot::new(
            vec![
                TenantRecord::new("Ada Park").with_external_id("T-2").with_unit("A1"),
                TenantRecord::new("Zed Young").with_external_id("T-5").with_unit("C1"),
            ],
            vec![
                UnitRecord::new("A1", UnitStatus::Occupied)
                    .with_external_id("U-A1")
                    .with_tenant("T-2"),
                UnitRecord::new("C1", UnitStatus::Occupied)
                    .with_external_id("U-C1")
                    .with_tenant("T-5"),
            ],
        );

        let detection = detect_changes(&external, &internal);
        assert_eq!(
            types(&detection),
            vec![
                ChangeType::UnitAdded,
                ChangeType::TenantRemoved,
                ChangeType::TenantAdded,
                ChangeType::UnitRemoved,
                ChangeType::UnitRemoved,
            ]
        );
    }

    #[test]
    fn test_duplicate_external_keys_warn() {
        let external = FacilitySnapshot::new(
            vec![
                TenantRecord::new("Jane Doe").with_external_id("T-1"),
                TenantRecord::new("Jane D.").with_external_id("T-1"),
            ],
            vec![],
        );
        let detection = detect_changes(&external, &FacilitySnapshot::default());
        assert_eq!(types(&detection), vec![ChangeType::TenantAdded]);
        assert_eq!(detection.warnings.len(), 1);
    }

    #[test]
    fn test_email_case_is_not_a_change() {
        let internal = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_external_id("T-1").with_email("Jane@Example.com")],
            vec![],
        );
        let external = FacilitySnapshot::new(
            vec![TenantRecord::new("Jane Doe").with_external_id("T-1").with_email("jane@example.com ")],
            vec![],
        );
        assert!(detect_changes(&external, &internal).is_empty());
    }
}
