use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::AgentRecord;
use crate::errors::{RegistryError, RegistryResult};

pub const INDEX_VERSION: u32 = 1;

/// One line of the index: enough to list agents without opening their files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    /// Record file, relative to the workspace directory
    pub file: PathBuf,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn for_record(record: &AgentRecord, file: PathBuf) -> Self {
        Self {
            name: record.name.clone(),
            file,
            description: record.description.clone(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIndex {
    pub version: u32,
    #[serde(default)]
    pub agents: Vec<IndexEntry>,
}

impl Default for AgentIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            agents: Vec::new(),
        }
    }
}

impl AgentIndex {
    /// Load the index, treating a missing file as an empty registry
    pub fn load(path: &Path) -> RegistryResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let index: AgentIndex =
            serde_json::from_str(&content).map_err(|e| RegistryError::CorruptIndex {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if index.version != INDEX_VERSION {
            return Err(RegistryError::CorruptIndex {
                path: path.to_path_buf(),
                reason: format!("unsupported index version {}", index.version),
            });
        }
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.agents.iter().position(|entry| entry.name == name)
    }
}

/// Write a file so readers see either the old or the new content: write to a
/// sibling temp file, fsync, then rename over the target.
pub fn write_atomic(path: &Path, content: &[u8]) -> RegistryResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let mut file = File::create(&tmp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_index_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = AgentIndex::load(&dir.path().join("agent_registry.json")).unwrap();
        assert_eq!(index, AgentIndex::default());
    }

    #[test]
    fn test_write_atomic_replaces_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_corrupt_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent_registry.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AgentIndex::load(&path),
            Err(RegistryError::CorruptIndex { .. })
        ));

        fs::write(&path, r#"{"version": 7, "agents": []}"#).unwrap();
        assert!(matches!(
            AgentIndex::load(&path),
            Err(RegistryError::CorruptIndex { .. })
        ));
    }
}
