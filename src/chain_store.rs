//! Swap Chain Store
//!
//! Persists the output of each forward swap under its "HH:MM" slot key so a
//! later dependent swap can spend it. File format is a flat JSON object of
//! decimal strings:
//!
//!   { "12:00": "0", "19:00": "0" }
//!
//! Reads never fail: a missing file is created with zero defaults, a corrupt
//! file is logged and treated as the defaults. Writes go to a temp file and
//! are renamed into place so readers never see a partial file.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use crate::error::{DispatchError, DispatchResult};
use alloy::primitives::U256;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// slot key ("HH:MM") -> smallest-unit amount as a decimal string
pub type SwapChainRecord = BTreeMap<String, String>;

pub struct SwapChainStore {
    path: PathBuf,
    default_slots: Vec<String>,
}

impl SwapChainStore {
    pub fn new<P: AsRef<Path>>(path: P, default_slots: Vec<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            default_slots,
        }
    }

    /// Every expected slot set to "0"
    pub fn default_record(&self) -> SwapChainRecord {
        self.default_slots
            .iter()
            .map(|slot| (slot.clone(), "0".to_string()))
            .collect()
    }

    /// Persisted mapping, with missing default slots filled in as "0"
    pub fn read(&self) -> SwapChainRecord {
        if !self.path.exists() {
            info!("{} not found, creating with zero defaults", self.path.display());
            let record = self.default_record();
            if let Err(e) = self.write(&record) {
                error!("Failed to create {}: {}", self.path.display(), e);
            }
            return record;
        }

        let mut record = match self.load() {
            Ok(r) => r,
            Err(e) => {
                warn!("{} - using zero defaults", e);
                return self.default_record();
            }
        };
        for slot in &self.default_slots {
            record.entry(slot.clone()).or_insert_with(|| "0".to_string());
        }
        record
    }

    fn load(&self) -> DispatchResult<SwapChainRecord> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            DispatchError::StateIo(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            DispatchError::StateIo(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    /// Replace the persisted mapping (temp file + rename)
    pub fn write(&self, record: &SwapChainRecord) -> DispatchResult<()> {
        let io_err = |what: &str, e: std::io::Error| {
            DispatchError::StateIo(format!("{} {}: {}", what, self.path.display(), e))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_err("failed to create dir for", e))?;
            }
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| DispatchError::StateIo(format!("failed to serialize chain record: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json).map_err(|e| io_err("failed to write temp file for", e))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| io_err("failed to rename temp file onto", e))?;

        info!("{} updated", self.path.display());
        Ok(())
    }

    /// Read-modify-write a single slot
    pub fn record_output(&self, slot: &str, amount: U256) -> DispatchResult<()> {
        let mut record = self.read();
        record.insert(slot.to_string(), amount.to_string());
        self.write(&record)
    }

    /// Recorded amount for `slot`; absent or unparsable values read as zero
    pub fn amount_for(&self, slot: &str) -> U256 {
        let record = self.read();
        match record.get(slot) {
            None => U256::ZERO,
            Some(raw) => raw.trim().parse::<U256>().unwrap_or_else(|e| {
                warn!("Slot {} holds unparsable amount '{}': {} - treating as 0", slot, raw, e);
                U256::ZERO
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> Vec<String> {
        vec!["12:00".to_string(), "19:00".to_string()]
    }

    #[test]
    fn test_read_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("swap_outputs.json");
        let store = SwapChainStore::new(&path, slots());

        let record = store.read();
        assert_eq!(record.get("12:00").map(String::as_str), Some("0"));
        assert_eq!(record.get("19:00").map(String::as_str), Some("0"));
        assert!(path.exists());
    }

    #[test]
    fn test_write_then_read_merges_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SwapChainStore::new(dir.path().join("s.json"), slots());
        store.read();

        let mut partial = SwapChainRecord::new();
        partial.insert("12:00".into(), "500".into());
        store.write(&partial).unwrap();

        let record = store.read();
        assert_eq!(record.len(), 2);
        assert_eq!(record["12:00"], "500");
        assert_eq!(record["19:00"], "0");
    }

    #[test]
    fn test_corrupt_file_reads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SwapChainStore::new(&path, slots());

        assert_eq!(store.read(), store.default_record());
        assert_eq!(store.amount_for("12:00"), U256::ZERO);
    }

    #[test]
    fn test_record_output_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = SwapChainStore::new(dir.path().join("s.json"), slots());

        store.record_output("19:00", U256::from(123u64)).unwrap();
        store.record_output("19:00", U256::from(456u64)).unwrap();
        assert_eq!(store.amount_for("19:00"), U256::from(456u64));
        assert_eq!(store.amount_for("12:00"), U256::ZERO);
        assert!(!dir.path().join("s.tmp").exists());
    }

    #[test]
    fn test_unknown_slot_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = SwapChainStore::new(dir.path().join("s.json"), slots());
        assert_eq!(store.amount_for("07:00"), U256::ZERO);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("taken");
        std::fs::create_dir_all(path.join("inner")).unwrap();
        let store = SwapChainStore::new(&path, slots());
        assert!(matches!(
            store.write(&store.default_record()),
            Err(DispatchError::StateIo(_))
        ));
    }
}
