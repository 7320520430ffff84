//! Per-market JSON records keyed by condition id

use std::fs;
use std::path::PathBuf;
use tracing::debug;

use super::{write_json_atomic, REGISTRY_FILE_NAME};
use crate::error::{AgentError, Result};
use crate::types::MarketRecord;

/// Reads and writes `markets/<conditionId>.json` files.
pub struct MarketRecordStore {
    data_dir: PathBuf,
}

impl MarketRecordStore {
    /// Creates the backing directory on first use if absent.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, condition_id: &str) -> PathBuf {
        self.data_dir.join(format!("{condition_id}.json"))
    }

    /// Idempotent keyed write: the same condition id always lands in the
    /// same file, so a rewrite overwrites and never duplicates.
    pub fn write(&self, record: &MarketRecord) -> Result<()> {
        if !record.settlement.is_consistent() {
            return Err(AgentError::validation(format!(
                "record {} violates the settlement invariant (winner present iff settled)",
                record.condition_id
            )));
        }
        let path = self.path_for(&record.condition_id);
        write_json_atomic(&path, record)?;
        debug!(
            condition_id = %record.condition_id,
            path = %path.display(),
            "market record written"
        );
        Ok(())
    }

    pub fn read(&self, condition_id: &str) -> Result<MarketRecord> {
        let path = self.path_for(condition_id);
        if !path.exists() {
            return Err(AgentError::NotFound(condition_id.to_string()));
        }
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Condition ids of every record file in the data directory. The index
    /// file and in-flight temp files are skipped.
    pub fn list_condition_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == REGISTRY_FILE_NAME || name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            ids.push(name.trim_end_matches(".json").to_string());
        }
        ids.sort();
        Ok(ids)
    }
}
