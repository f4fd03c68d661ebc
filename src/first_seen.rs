//! Durable first-seen timestamps, so they survive restarts.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use log::warn;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    model::{CellIdentity, CellObservation},
};

const KEY_PREFIX: &str = "first_seen_";

/// What a first-seen timestamp is remembered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirstSeenKey {
    /// The raw cell id only. A cell id that shows up again under a different
    /// area code, PCI or channel keeps its original first-seen time.
    #[default]
    CellId,
    /// The full [`CellIdentity`].
    Identity,
}

impl FirstSeenKey {
    pub fn key_for(self, observation: &CellObservation, identity: &CellIdentity) -> String {
        match self {
            FirstSeenKey::CellId => observation.cell_id.clone(),
            FirstSeenKey::Identity => identity.to_string(),
        }
    }
}

pub trait FirstSeenStore: Send {
    /// Returns the stored timestamp for `key`, storing `now` first if there
    /// is none yet.
    fn get_or_insert(&mut self, key: &str, now: &str) -> Result<String>;
}

#[derive(Debug, Default)]
pub struct MemoryFirstSeenStore {
    entries: BTreeMap<String, String>,
}

impl FirstSeenStore for MemoryFirstSeenStore {
    fn get_or_insert(&mut self, key: &str, now: &str) -> Result<String> {
        Ok(self
            .entries
            .entry(format!("{KEY_PREFIX}{key}"))
            .or_insert_with(|| now.to_owned())
            .clone())
    }
}

/// Flat JSON object on disk, rewritten whenever a new key is added.
#[derive(Debug)]
pub struct JsonFirstSeenStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFirstSeenStore {
    pub fn open(path: &Path) -> Result<Self> {
        let entries = match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| Error::Store {
                path: path.to_owned(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::Store {
                    path: path.to_owned(),
                    message: e.to_string(),
                })
            }
        };

        Ok(Self {
            path: path.to_owned(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn save(&self) -> Result<()> {
        let store_error = |message: String| Error::Store {
            path: self.path.clone(),
            message,
        };

        if let Some(parent) = self.path.parent().filter(|x| !x.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| store_error(e.to_string()))?;
        }
        let data =
            serde_json::to_string_pretty(&self.entries).map_err(|e| store_error(e.to_string()))?;

        // write then rename, a crash mid-write must not lose older entries
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| store_error(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| store_error(e.to_string()))
    }
}

impl FirstSeenStore for JsonFirstSeenStore {
    fn get_or_insert(&mut self, key: &str, now: &str) -> Result<String> {
        let key = format!("{KEY_PREFIX}{key}");
        if let Some(x) = self.entries.get(&key) {
            return Ok(x.clone());
        }

        self.entries.insert(key, now.to_owned());
        self.save()?;
        Ok(now.to_owned())
    }
}

/// Opens the JSON store at `path`. A store that cannot be read is left
/// untouched on disk and first sightings are only kept in memory.
pub fn open_or_in_memory(path: &Path) -> Box<dyn FirstSeenStore> {
    match JsonFirstSeenStore::open(path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!("{e}, first seen times will not persist this session");
            Box::new(MemoryFirstSeenStore::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_wins() {
        let mut store = MemoryFirstSeenStore::default();
        assert_eq!(store.get_or_insert("500", "a").unwrap(), "a");
        assert_eq!(store.get_or_insert("500", "b").unwrap(), "a");
        assert_eq!(store.get_or_insert("501", "c").unwrap(), "c");
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("first_seen.json");

        let mut store = JsonFirstSeenStore::open(&path).unwrap();
        assert_eq!(store.len(), 0);
        assert_eq!(store.get_or_insert("500", "early").unwrap(), "early");
        drop(store);

        let mut store = JsonFirstSeenStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_or_insert("500", "late").unwrap(), "early");

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"first_seen_500\""));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("first_seen.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFirstSeenStore::open(&path),
            Err(Error::Store { .. })
        ));
    }

    #[test]
    fn corrupt_file_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("first_seen.json");
        fs::write(&path, "not json").unwrap();

        let mut store = open_or_in_memory(&path);
        assert_eq!(store.get_or_insert("500", "a").unwrap(), "a");
        assert_eq!(store.get_or_insert("500", "b").unwrap(), "a");
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
    }
}
