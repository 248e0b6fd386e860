//! Persistent key-value store
//!
//! Small JSON document kept next to the application. It remembers the line
//! speed the module was last switched to and which template slots hold an
//! enrolled fingerprint. Writes go through a temporary file and keep a
//! `.bck` copy until the new document is in place.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gt521_core::constants::DEFAULT_BAUD_RATE;
use gt521_types::BaudRate;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

/// Default location of the store document
pub const DEFAULT_STORE_PATH: &str = "./.fingerprint-store";

/// Template slots tracked when nothing is stored yet
pub const DEFAULT_SLOT_CAPACITY: usize = 200;

const BAUD_RATE_KEY: &str = "baud_rate";
const SLOTS_KEY: &str = "slots";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Store format error: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug)]
pub struct FingerprintStore {
    path: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
}

impl FingerprintStore {
    /// Load the document at `path`, starting empty if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(err) => return Err(err.into()),
        };

        debug!(keys = values.len(), "Loaded store {}", path.display());

        Ok(Self {
            path: Some(path),
            values: Mutex::new(values),
        })
    }

    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(Map::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Value under `key`, or `default` if missing or of another shape
    ///
    /// Dots in `key` walk into nested objects: `"sensor.label"`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let value = lookup(&self.values.lock(), key).cloned();
        value
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(default)
    }

    /// Store `value` under `key`, creating intermediate objects for dotted keys
    pub fn put<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let path: Vec<&str> = key.split('.').collect();
        let mut values = self.values.lock();
        insert(&mut values, &path, value);
        self.persist(&values)
    }

    /// Line speed to open the port with
    pub fn baud_rate(&self) -> BaudRate {
        let raw: u32 = self.get(BAUD_RATE_KEY, DEFAULT_BAUD_RATE);
        BaudRate::try_from(raw).unwrap_or_else(|_| {
            warn!(raw, "Stored baud rate is not supported, using default");
            BaudRate::default()
        })
    }

    pub fn set_baud_rate(&self, baud_rate: BaudRate) -> Result<()> {
        self.put(BAUD_RATE_KEY, baud_rate.as_u32())
    }

    /// Lowest slot not marked as used
    pub fn available_slot(&self) -> Option<u32> {
        let slots = read_slots(&self.values.lock());
        slots.iter().position(|used| !used).map(|index| index as u32)
    }

    pub fn is_used(&self, id: u32) -> bool {
        let slots = read_slots(&self.values.lock());
        slots.get(id as usize).copied().unwrap_or(false)
    }

    pub fn mark_used(&self, id: u32) -> Result<()> {
        self.set_slot(id, true)
    }

    pub fn mark_free(&self, id: u32) -> Result<()> {
        self.set_slot(id, false)
    }

    /// Mark every slot free
    pub fn clear_slots(&self) -> Result<()> {
        let mut values = self.values.lock();
        let capacity = read_slots(&values).len();
        values.insert(SLOTS_KEY.to_owned(), serde_json::to_value(vec![false; capacity])?);
        self.persist(&values)
    }

    /// Modules with more slots than tracked grow the list on demand
    fn set_slot(&self, id: u32, used: bool) -> Result<()> {
        let mut values = self.values.lock();
        let mut slots = read_slots(&values);

        let index = id as usize;
        if index >= slots.len() {
            slots.resize(index + 1, false);
        }
        slots[index] = used;

        values.insert(SLOTS_KEY.to_owned(), serde_json::to_value(slots)?);
        self.persist(&values)
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let text = serde_json::to_string_pretty(values)?;
        let temp = sibling(path, "temp");
        let backup = sibling(path, "bck");

        remove_if_exists(&temp)?;
        remove_if_exists(&backup)?;

        {
            let mut file = File::create(&temp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }

        if path.exists() {
            fs::rename(path, &backup)?;
        }
        fs::rename(&temp, path)?;
        remove_if_exists(&backup)?;

        trace!("Persisted store {}", path.display());
        Ok(())
    }
}

fn lookup<'a>(values: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let first = values.get(parts.next()?)?;
    parts.try_fold(first, |value, part| value.get(part))
}

fn insert(values: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            values.insert((*last).to_owned(), value);
        }
        [first, rest @ ..] => {
            let child = values
                .entry(*first)
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                insert(child, rest, value);
            }
        }
    }
}

fn read_slots(values: &Map<String, Value>) -> Vec<bool> {
    let mut slots: Vec<bool> = values
        .get(SLOTS_KEY)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    let capacity = slots.len().max(DEFAULT_SLOT_CAPACITY);
    slots.resize(capacity, false);
    slots
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let store = FingerprintStore::in_memory();
        assert_eq!(store.baud_rate(), BaudRate::B9600);
        assert_eq!(store.available_slot(), Some(0));
        assert!(!store.is_used(3));
        assert_eq!(store.get("missing", 7u8), 7);
    }

    #[test]
    fn test_slots() {
        let store = FingerprintStore::in_memory();
        store.mark_used(0).unwrap();
        store.mark_used(1).unwrap();
        assert_eq!(store.available_slot(), Some(2));

        store.mark_free(0).unwrap();
        assert_eq!(store.available_slot(), Some(0));
        assert!(store.is_used(1));

        store.clear_slots().unwrap();
        assert!(!store.is_used(1));
    }

    #[test]
    fn test_slots_beyond_default_capacity() {
        let store = FingerprintStore::in_memory();
        store.mark_used(2500).unwrap();
        assert!(store.is_used(2500));
        assert!(!store.is_used(2499));
        assert_eq!(store.available_slot(), Some(0));

        store.mark_free(2500).unwrap();
        assert!(!store.is_used(2500));

        store.mark_used(2500).unwrap();
        store.clear_slots().unwrap();
        assert!(!store.is_used(2500));
    }

    #[test]
    fn test_dotted_keys() {
        let store = FingerprintStore::in_memory();
        store.put("sensor.label", "front door").unwrap();
        store.put("sensor.zone", 3).unwrap();

        assert_eq!(store.get("sensor.label", String::new()), "front door");
        assert_eq!(store.get("sensor.zone", 0u32), 3);
        assert_eq!(store.get("sensor.missing", 9u32), 9);

        let sensor: Value = store.get("sensor", Value::Null);
        assert_eq!(sensor["label"], "front door");

        store.put("sensor.label.text", "side door").unwrap();
        assert_eq!(store.get("sensor.label.text", String::new()), "side door");
        assert_eq!(store.get("sensor.zone", 0u32), 3);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FingerprintStore::open(&path).unwrap();
            store.set_baud_rate(BaudRate::B57600).unwrap();
            store.mark_used(4).unwrap();
            store.put("label", "front door").unwrap();
        }

        let store = FingerprintStore::open(&path).unwrap();
        assert_eq!(store.baud_rate(), BaudRate::B57600);
        assert!(store.is_used(4));
        assert_eq!(store.get("label", String::new()), "front door");

        assert!(!sibling(&path, "temp").exists());
        assert!(!sibling(&path, "bck").exists());
    }

    #[test]
    fn test_unsupported_baud_rate_falls_back() {
        let store = FingerprintStore::in_memory();
        store.put(BAUD_RATE_KEY, 14400).unwrap();
        assert_eq!(store.baud_rate(), BaudRate::B9600);
    }

    #[test]
    fn test_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FingerprintStore::open(&path),
            Err(StoreError::Json(_))
        ));
    }
}
