use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::{
    fs::File,
    path::{Path, PathBuf},
};

use crate::{Result, StorageError};

/// Named string slots, the way browser storage exposes them. Writes may fail, reads never do.
pub trait Storage: Send {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String) -> Result<()>;
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }
}

/// Slots kept in memory only, gone with the process
#[derive(Default, Debug)]
pub struct MemoryStorage {
    slots: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.slots.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<()> {
        self.slots.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.slots.remove(key);
        Ok(())
    }
}

/// Slots persisted together as one JSON object, the whole file is rewritten on every change
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    slots: BTreeMap<String, String>,
}

impl FileStorage {
    /// Opens the file at `path`, a missing file is empty storage
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let slots = match Self::read_slots(&path) {
            Ok(slots) => slots,
            Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };

        Ok(Self { path, slots })
    }

    fn read_slots(path: &Path) -> Result<BTreeMap<String, String>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn persist(&self) -> Result<()> {
        let mut output = File::create(&self.path)?;
        write!(output, "{}", serde_json::to_string_pretty(&self.slots)?)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.slots.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<()> {
        self.slots.insert(key.to_string(), value);
        self.persist()
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        if self.slots.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}
