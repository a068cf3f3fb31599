//! Snapshot fixture files.
//!
//! A fixture is a JSON object with `tenants` and `units` arrays, the same
//! shape the simulated provider serves.

use fms_provider::types::FacilitySnapshot;
use std::path::Path;

use crate::error::{CliError, CliResult};

/// Read a snapshot from a JSON file.
pub fn load_snapshot(path: &Path) -> CliResult<FacilitySnapshot> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|e| CliError::Fixture {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a snapshot as pretty-printed JSON.
pub fn save_snapshot(path: &Path, snapshot: &FacilitySnapshot) -> CliResult<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json + "\n").map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join(name)
    }

    #[test]
    fn test_bundled_fixtures_parse() {
        let external = load_snapshot(&fixture("facility-external.json")).unwrap();
        let internal = load_snapshot(&fixture("facility-internal.json")).unwrap();
        assert!(!external.tenants.is_empty());
        assert!(!internal.units.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_snapshot(&fixture("does-not-exist.json")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn test_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("fms-cli-{}.json", uuid::Uuid::new_v4()));
        let snapshot = load_snapshot(&fixture("facility-internal.json")).unwrap();
        save_snapshot(&path, &snapshot).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
        let _ = std::fs::remove_file(path);
    }
}
