//! JSON schema side-car stored next to a table file
//!
//! The side-car maps every field added at the LOCAL tier to its element type
//! tag (see [`crate::table::type_tag`]). A missing or unreadable side-car reads
//! as empty; the next write replaces it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use datalab_core::Result;

use crate::io::{stage_file, StagedFile};

/// Field name to type tag
pub type FieldTypes = BTreeMap<String, String>;

/// Side-car file for one table file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSidecar {
    path: PathBuf,
}

impl SchemaSidecar {
    /// Side-car of `data_path`: same stem, `.json` suffix
    pub fn for_data_file(data_path: &Path) -> Self {
        Self::with_extension(data_path, "json")
    }

    /// Side-car of `data_path` with a custom suffix
    pub fn with_extension(data_path: &Path, extension: &str) -> Self {
        Self {
            path: data_path.with_extension(extension),
        }
    }

    /// Location of the side-car
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current entries; empty when the file is absent or malformed
    pub fn load(&self) -> FieldTypes {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return FieldTypes::new(),
        };

        match serde_json::from_slice(&bytes) {
            Ok(types) => types,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring malformed schema side-car");
                FieldTypes::new()
            }
        }
    }

    /// Recorded type tag of `field`
    pub fn get(&self, field: &str) -> Option<String> {
        self.load().remove(field)
    }

    /// Record `field` with `type_tag`, creating the side-car if needed
    pub fn record(&self, field: &str, type_tag: &str) -> Result<()> {
        self.stage_record(field, type_tag)?.commit()?;
        Ok(())
    }

    /// Drop `field`; returns whether an entry was present
    pub fn remove(&self, field: &str) -> Result<bool> {
        let mut types = self.load();
        let present = types.remove(field).is_some();
        self.stage(&types)?.commit()?;
        Ok(present)
    }

    /// Stage the side-car with `field` recorded as `type_tag`
    pub fn stage_record(&self, field: &str, type_tag: &str) -> Result<StagedFile> {
        let mut types = self.load();
        types.insert(field.to_string(), type_tag.to_string());
        self.stage(&types)
    }

    /// Stage the side-car without `field`
    pub fn stage_remove(&self, field: &str) -> Result<StagedFile> {
        let mut types = self.load();
        types.remove(field);
        self.stage(&types)
    }

    fn stage(&self, types: &FieldTypes) -> Result<StagedFile> {
        let bytes = serde_json::to_vec_pretty(types)?;
        stage_file(&self.path, &[&bytes])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path_replaces_extension() {
        let sidecar = SchemaSidecar::for_data_file(Path::new("/data/train.arrow"));
        assert_eq!(sidecar.path(), Path::new("/data/train.json"));
    }

    #[test]
    fn test_record_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = SchemaSidecar::for_data_file(&dir.path().join("train.arrow"));

        assert!(sidecar.load().is_empty());
        sidecar.record("length", "int64").unwrap();
        sidecar.record("tokens", "list<string>").unwrap();

        assert_eq!(sidecar.get("length").as_deref(), Some("int64"));
        assert_eq!(sidecar.load().len(), 2);

        assert!(sidecar.remove("length").unwrap());
        assert!(!sidecar.remove("length").unwrap());
        assert_eq!(sidecar.load().keys().collect::<Vec<_>>(), ["tokens"]);
    }

    #[test]
    fn test_staged_record_waits_for_commit() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = SchemaSidecar::for_data_file(&dir.path().join("train.arrow"));
        sidecar.record("length", "int64").unwrap();

        let staged = sidecar.stage_remove("length").unwrap();
        assert_eq!(sidecar.get("length").as_deref(), Some("int64"));

        staged.commit().unwrap();
        assert!(sidecar.load().is_empty());
    }

    #[test]
    fn test_malformed_sidecar_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = SchemaSidecar::for_data_file(&dir.path().join("train.arrow"));
        std::fs::write(sidecar.path(), b"{ not json").unwrap();

        assert!(sidecar.load().is_empty());

        sidecar.record("length", "int64").unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(sidecar.path()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"length": "int64"}));
    }
}
