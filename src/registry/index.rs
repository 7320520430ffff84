//! Master market index: `markets/registry.json`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use super::write_json_atomic;
use crate::error::{AgentError, Result};
use crate::types::{Outcome, RegistryEntry, RegistryFile};

pub const REGISTRY_FILE_NAME: &str = "registry.json";

/// Read-modify-write access to the master index.
///
/// Mutations hold an internal mutex for the whole load-edit-save cycle, and
/// saves go through an atomic temp-file replace. In-process writers never
/// lose updates to each other; a crash mid-save leaves the previous index
/// intact.
pub struct RegistryIndex {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl RegistryIndex {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            path: data_dir.join(REGISTRY_FILE_NAME),
            write_guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current index. A missing file is the first-run case and loads as an
    /// empty index rather than an error.
    pub fn load(&self) -> Result<RegistryFile> {
        if !self.path.exists() {
            return Ok(RegistryFile::default());
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, index: &RegistryFile) -> Result<()> {
        write_json_atomic(&self.path, index)
    }

    /// Registers a newly created market. Creation is append-only: a
    /// condition id already present fails with `DuplicateConditionId`
    /// instead of being silently overwritten.
    pub fn append(&self, entry: RegistryEntry) -> Result<()> {
        let _guard = self.write_guard.lock().unwrap();
        let mut index = self.load()?;
        if index
            .markets
            .iter()
            .any(|m| m.condition_id == entry.condition_id)
        {
            return Err(AgentError::DuplicateConditionId(entry.condition_id));
        }
        index.markets.push(entry);
        self.save(&index)
    }

    /// Flips an entry to settled. Settlement is not re-entrant: a second
    /// call for the same condition id fails with `AlreadySettled`.
    pub fn mark_settled(&self, condition_id: &str, winner: Outcome) -> Result<()> {
        let _guard = self.write_guard.lock().unwrap();
        let mut index = self.load()?;
        let entry = index
            .markets
            .iter_mut()
            .find(|m| m.condition_id == condition_id)
            .ok_or_else(|| AgentError::NotFound(condition_id.to_string()))?;
        if entry.is_settled {
            return Err(AgentError::AlreadySettled(condition_id.to_string()));
        }
        entry.is_settled = true;
        entry.winner = Some(winner);
        self.save(&index)?;
        info!(condition_id, winner = %winner, "index entry marked settled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "marketbot_index_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn entry(condition_id: &str, end_time_unix: i64) -> RegistryEntry {
        RegistryEntry {
            condition_id: condition_id.to_string(),
            question: "Q1".to_string(),
            end_time_unix,
            is_settled: false,
            winner: None,
        }
    }

    #[test]
    fn missing_file_loads_as_empty_index() {
        let index = RegistryIndex::new(temp_data_dir("first_run")).unwrap();
        let loaded = index.load().unwrap();
        assert!(loaded.markets.is_empty());
    }

    #[test]
    fn append_then_load_returns_exactly_the_entry() {
        let index = RegistryIndex::new(temp_data_dir("append")).unwrap();
        let input = entry("0xabc", 1000);

        index.append(input.clone()).unwrap();
        let loaded = index.load().unwrap();

        assert_eq!(loaded.markets.len(), 1);
        assert_eq!(loaded.markets[0], input);
    }

    #[test]
    fn duplicate_append_is_rejected() {
        let index = RegistryIndex::new(temp_data_dir("duplicate")).unwrap();
        index.append(entry("0xabc", 1000)).unwrap();

        let err = index.append(entry("0xabc", 2000)).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateConditionId(id) if id == "0xabc"));

        // The original entry is untouched.
        let loaded = index.load().unwrap();
        assert_eq!(loaded.markets.len(), 1);
        assert_eq!(loaded.markets[0].end_time_unix, 1000);
    }

    #[test]
    fn mark_settled_sets_winner_once() {
        let index = RegistryIndex::new(temp_data_dir("settle")).unwrap();
        index.append(entry("0xabc", 1000)).unwrap();

        index.mark_settled("0xabc", Outcome::Yes).unwrap();
        let loaded = index.load().unwrap();
        assert!(loaded.markets[0].is_settled);
        assert_eq!(loaded.markets[0].winner, Some(Outcome::Yes));
    }

    #[test]
    fn second_mark_settled_fails_with_already_settled() {
        let index = RegistryIndex::new(temp_data_dir("resettle")).unwrap();
        index.append(entry("0xabc", 1000)).unwrap();
        index.mark_settled("0xabc", Outcome::Yes).unwrap();

        let err = index.mark_settled("0xabc", Outcome::No).unwrap_err();
        assert!(matches!(err, AgentError::AlreadySettled(id) if id == "0xabc"));

        // The first verdict stands.
        let loaded = index.load().unwrap();
        assert_eq!(loaded.markets[0].winner, Some(Outcome::Yes));
    }

    #[test]
    fn mark_settled_on_unknown_id_fails_with_not_found() {
        let index = RegistryIndex::new(temp_data_dir("unknown")).unwrap();
        let err = index.mark_settled("0xnope", Outcome::No).unwrap_err();
        assert!(matches!(err, AgentError::NotFound(id) if id == "0xnope"));
    }

    #[test]
    fn save_of_unchanged_load_is_a_byte_noop() {
        let index = RegistryIndex::new(temp_data_dir("noop")).unwrap();
        index.append(entry("0xabc", 1000)).unwrap();
        index.append(entry("0xdef", 2000)).unwrap();

        let before = fs::read(index.path()).unwrap();
        let loaded = index.load().unwrap();
        index.save(&loaded).unwrap();
        let after = fs::read(index.path()).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn entries_keep_insertion_order() {
        let index = RegistryIndex::new(temp_data_dir("order")).unwrap();
        for (id, end) in [("0x1", 300), ("0x2", 100), ("0x3", 200)] {
            index.append(entry(id, end)).unwrap();
        }
        let ids: Vec<String> = index
            .load()
            .unwrap()
            .markets
            .into_iter()
            .map(|m| m.condition_id)
            .collect();
        assert_eq!(ids, vec!["0x1", "0x2", "0x3"]);
    }
}
