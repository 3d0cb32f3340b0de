//! Fixed listing held in memory.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{DirectoryEntry, FileSystem};
use crate::error::{Result, VfsError};
use crate::path_spec::TypeIndicator;

/// File system over a snapshot of entries, used for `FAKE` sources.
pub struct MemoryFileSystem {
    type_indicator: TypeIndicator,
    entries: RwLock<Option<BTreeMap<String, DirectoryEntry>>>,
}

impl MemoryFileSystem {
    pub fn new(type_indicator: TypeIndicator, entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();
        Self {
            type_indicator,
            entries: RwLock::new(Some(entries)),
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator.clone()
    }

    fn entry(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        match self.entries.read().as_ref() {
            Some(entries) => Ok(entries.get(path).cloned()),
            None => Err(VfsError::closed(format!("{} file system", self.type_indicator))),
        }
    }

    fn entries(&self) -> Result<Vec<DirectoryEntry>> {
        match self.entries.read().as_ref() {
            Some(entries) => Ok(entries.values().cloned().collect()),
            None => Err(VfsError::closed(format!("{} file system", self.type_indicator))),
        }
    }

    fn close(&self) {
        self.entries.write().take();
    }
}
