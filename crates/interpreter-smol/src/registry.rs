//! A directory-backed store of agent definitions.
//!
//! ```text
//! <workspace>/agent_registry.json    index, authoritative for which agents exist
//! <workspace>/agents/<name>.yaml     one record per agent
//! ```
//!
//! Every write goes through a temp file and a rename. Creating writes the record
//! before the index; deleting parks the record under a hidden trash name before
//! the index is rewritten, so an interrupted operation never leaves the index
//! pointing at a half-written agent. Access is single-process and unlocked.
pub mod index;
pub mod record;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::{RegistryError, RegistryResult};
use index::{write_atomic, AgentIndex, IndexEntry};
use record::{AgentRecord, AgentUpdate, NewAgent};

pub const INDEX_FILE: &str = "agent_registry.json";
pub const AGENTS_DIR: &str = "agents";
pub const RECORD_EXTENSION: &str = "yaml";
pub const DEFAULT_WORKSPACE: &str = "./agent_workspace";
pub const WORKSPACE_ENV: &str = "INTERPRETER_SMOL_WORKSPACE";
const TRASH_SUFFIX: &str = ".trash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub workspace_dir: PathBuf,
}

impl RegistryConfig {
    pub fn new<P: Into<PathBuf>>(workspace_dir: P) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
        }
    }

    /// Workspace from `INTERPRETER_SMOL_WORKSPACE`, else `./agent_workspace`
    pub fn from_env() -> Self {
        let workspace_dir = std::env::var(WORKSPACE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_WORKSPACE));
        Self { workspace_dir }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORKSPACE)
    }
}

#[derive(Debug)]
pub struct AgentRegistry {
    root: PathBuf,
    index: AgentIndex,
    records: HashMap<String, AgentRecord>,
    orphaned: Vec<PathBuf>,
    skipped: Vec<String>,
}

impl AgentRegistry {
    pub fn open(config: RegistryConfig) -> RegistryResult<Self> {
        let root = config.workspace_dir;
        fs::create_dir_all(root.join(AGENTS_DIR))?;

        let stored = AgentIndex::load(&root.join(INDEX_FILE))?;
        let referenced: HashSet<PathBuf> = stored
            .agents
            .iter()
            .map(|entry| root.join(&entry.file))
            .collect();

        let mut index = AgentIndex::default();
        let mut records = HashMap::new();
        let mut skipped = Vec::new();

        for entry in stored.agents {
            if records.contains_key(&entry.name) {
                warn!(agent = %entry.name, "Duplicate index entry, keeping the first");
                continue;
            }
            match load_indexed_record(&root, &entry) {
                Ok(record) => {
                    records.insert(record.name.clone(), record);
                    index.agents.push(entry);
                }
                Err(reason) => {
                    warn!(agent = %entry.name, "Skipping agent: {}", reason);
                    skipped.push(entry.name);
                }
            }
        }

        let orphaned = find_orphans(&root.join(AGENTS_DIR), &referenced)?;
        for path in &orphaned {
            warn!(
                path = %path.display(),
                "Record file is not in the agent index and will be ignored"
            );
        }

        debug!(
            workspace = %root.display(),
            agents = index.agents.len(),
            "Opened agent registry"
        );

        Ok(Self {
            root,
            index,
            records,
            orphaned,
            skipped,
        })
    }

    pub fn open_dir<P: Into<PathBuf>>(workspace_dir: P) -> RegistryResult<Self> {
        Self::open(RegistryConfig::new(workspace_dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record files found at open time that the index does not reference,
    /// including parked records a finished delete failed to remove
    pub fn orphaned_files(&self) -> &[PathBuf] {
        &self.orphaned
    }

    /// Indexed agents whose record could not be loaded at open time
    pub fn skipped_agents(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.index.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.agents.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn create(&mut self, agent: NewAgent) -> RegistryResult<AgentRecord> {
        validate_name(&agent.name)?;
        if self.records.contains_key(&agent.name) {
            return Err(RegistryError::DuplicateName(agent.name));
        }

        let relative = record_file(&agent.name);
        let path = self.root.join(&relative);
        if path.exists() {
            return Err(RegistryError::UntrackedRecord(path));
        }

        let record = agent.into_record(Utc::now());
        save_record(&path, &record)?;

        self.index
            .agents
            .push(IndexEntry::for_record(&record, relative));
        if let Err(err) = self.index.save(&self.index_path()) {
            self.index.agents.pop();
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(path = %path.display(), "Could not remove record after failed create: {}", cleanup);
            }
            return Err(err);
        }

        self.records.insert(record.name.clone(), record.clone());
        info!(agent = %record.name, "Created agent");
        Ok(record)
    }

    pub fn get(&self, name: &str) -> RegistryResult<&AgentRecord> {
        self.records
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All agents, in the order they were created
    pub fn list(&self) -> Vec<&AgentRecord> {
        self.index
            .agents
            .iter()
            .filter_map(|entry| self.records.get(&entry.name))
            .collect()
    }

    pub fn update(&mut self, name: &str, update: AgentUpdate) -> RegistryResult<AgentRecord> {
        let current = self.get(name)?.clone();
        let position = self
            .index
            .position(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let mut updated = current.clone();
        update.apply(&mut updated, Utc::now());

        let path = self.root.join(&self.index.agents[position].file);
        save_record(&path, &updated)?;

        if self.index.agents[position].description != updated.description {
            let previous = std::mem::replace(
                &mut self.index.agents[position].description,
                updated.description.clone(),
            );
            if let Err(err) = self.index.save(&self.index_path()) {
                self.index.agents[position].description = previous;
                if let Err(restore) = save_record(&path, &current) {
                    warn!(agent = %name, "Could not restore record after failed update: {}", restore);
                }
                return Err(err);
            }
        }

        self.records.insert(name.to_string(), updated.clone());
        info!(agent = %name, "Updated agent");
        Ok(updated)
    }

    pub fn delete(&mut self, name: &str) -> RegistryResult<AgentRecord> {
        let position = self
            .index
            .position(name)
            .filter(|_| self.records.contains_key(name))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let entry = self.index.agents[position].clone();
        let path = self.root.join(&entry.file);
        let trash = trash_path(&path);

        // Phase one: park the record. Nothing is applied if this fails.
        fs::rename(&path, &trash)?;

        // Phase two: drop the index entry, or put the record back.
        self.index.agents.remove(position);
        if let Err(err) = self.index.save(&self.index_path()) {
            self.index.agents.insert(position, entry);
            if let Err(restore) = fs::rename(&trash, &path) {
                warn!(agent = %name, "Could not restore record after failed delete: {}", restore);
            }
            return Err(err);
        }

        if let Err(e) = fs::remove_file(&trash) {
            warn!(path = %trash.display(), "Could not remove deleted record: {}", e);
        }

        let record = self
            .records
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        info!(agent = %name, "Deleted agent");
        Ok(record)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("agent name regex is valid"))
}

pub fn validate_name(name: &str) -> RegistryResult<()> {
    if name_regex().is_match(name) {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.to_string()))
    }
}

fn record_file(name: &str) -> PathBuf {
    Path::new(AGENTS_DIR).join(format!("{}.{}", name, RECORD_EXTENSION))
}

fn trash_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", file_name, TRASH_SUFFIX))
}

fn save_record(path: &Path, record: &AgentRecord) -> RegistryResult<()> {
    let content = serde_yaml::to_string(record)?;
    write_atomic(path, content.as_bytes())
}

fn load_record(path: &Path) -> RegistryResult<AgentRecord> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Load the record an index entry points at. A record parked by an interrupted
/// delete is moved back, since the index still lists the agent.
fn load_indexed_record(root: &Path, entry: &IndexEntry) -> Result<AgentRecord, String> {
    let path = root.join(&entry.file);
    let trash = trash_path(&path);
    if !path.exists() && trash.exists() {
        fs::rename(&trash, &path).map_err(|e| format!("could not restore parked record: {}", e))?;
        warn!(agent = %entry.name, "Restored record left behind by an interrupted delete");
    }

    let record = load_record(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if record.name != entry.name {
        return Err(format!(
            "{} holds agent '{}'",
            path.display(),
            record.name
        ));
    }
    Ok(record)
}

/// `.<name>.yaml.trash` -> `<name>.yaml`
fn parked_record_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix('.')?
        .strip_suffix(TRASH_SUFFIX)
        .filter(|name| !name.is_empty())
}

fn find_orphans(dir: &Path, referenced: &HashSet<PathBuf>) -> RegistryResult<Vec<PathBuf>> {
    let mut orphans = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let record_path = if let Some(parked) = parked_record_name(&file_name) {
            // left behind by a delete that rewrote the index but never cleaned up
            path.with_file_name(parked)
        } else if file_name.starts_with('.') {
            continue;
        } else {
            path.clone()
        };
        let is_record = record_path
            .extension()
            .is_some_and(|ext| ext == RECORD_EXTENSION);
        if is_record && !referenced.contains(&record_path) {
            orphans.push(path);
        }
    }
    orphans.sort();
    Ok(orphans)
}
