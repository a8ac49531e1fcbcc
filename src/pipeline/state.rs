//! Persistent record of generated profile keys.
//!
//! The set only grows. A key in the set that shows up again as a brand new
//! generated profile means the user deleted that profile from their document.

use crate::model::guid::Guid;
use crate::paths::write_atomic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

pub trait GeneratedProfileStore: Send + Sync {
    fn load_generated_ids(&self) -> Result<BTreeSet<Uuid>>;
    fn save_generated_ids(&self, ids: &BTreeSet<Uuid>) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFile {
    #[serde(default)]
    generated_profiles: Vec<Guid>,
    /// Keys written by other components are carried through untouched.
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

/// Stores the set in a JSON state file (`state.json`).
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StateFile> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(StateFile::default()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("parsing state file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateFile::default()),
            Err(e) => {
                Err(e).with_context(|| format!("reading state file {}", self.path.display()))
            }
        }
    }
}

impl GeneratedProfileStore for JsonStateStore {
    fn load_generated_ids(&self) -> Result<BTreeSet<Uuid>> {
        Ok(self
            .read()?
            .generated_profiles
            .into_iter()
            .map(|g| g.0)
            .collect())
    }

    fn save_generated_ids(&self, ids: &BTreeSet<Uuid>) -> Result<()> {
        let mut state = self.read()?;
        state.generated_profiles = ids.iter().copied().map(Guid).collect();
        let json = serde_json::to_string_pretty(&state)?;
        write_atomic(&self.path, json.as_bytes())
            .with_context(|| format!("writing state file {}", self.path.display()))
    }
}

/// In-memory store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    ids: Mutex<BTreeSet<Uuid>>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().collect()),
            saves: Mutex::new(0),
        }
    }

    pub fn ids(&self) -> BTreeSet<Uuid> {
        self.ids.lock().map(|ids| ids.clone()).unwrap_or_default()
    }

    /// Number of times the set has been saved.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }
}

impl GeneratedProfileStore for MemoryStateStore {
    fn load_generated_ids(&self) -> Result<BTreeSet<Uuid>> {
        let ids = self
            .ids
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?;
        Ok(ids.clone())
    }

    fn save_generated_ids(&self, ids: &BTreeSet<Uuid>) -> Result<()> {
        let mut stored = self
            .ids
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?;
        *stored = ids.clone();
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
