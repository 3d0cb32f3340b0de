//! Generic container file system over a pluggable directory parser.
//!
//! On-disk formats (ZIP central directories, TAR headers, partition tables) are
//! parsed by a [`DirectoryParser`] supplied by the caller. This module turns the
//! parser's `inner path -> (offset, size)` list into a lookup table, checking
//! every entry against the parent stream once, at open time.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{DirectoryEntry, FileSystem};
use crate::error::{Result, VfsError};
use crate::file_object::FileObject;
use crate::path_spec::TypeIndicator;

/// Format-specific directory parser consumed by container helpers.
pub trait DirectoryParser: Send + Sync {
    /// List the entries stored in `source`
    fn parse(&self, source: &dyn FileObject) -> Result<Vec<DirectoryEntry>>;
}

impl<F> DirectoryParser for F
where
    F: Fn(&dyn FileObject) -> Result<Vec<DirectoryEntry>> + Send + Sync,
{
    fn parse(&self, source: &dyn FileObject) -> Result<Vec<DirectoryEntry>> {
        self(source)
    }
}

/// Parsed container: entry table plus the parent stream the entries point into.
pub struct ContainerFileSystem {
    type_indicator: TypeIndicator,
    parent: Arc<dyn FileObject>,
    /// `None` once closed
    entries: RwLock<Option<BTreeMap<String, DirectoryEntry>>>,
}

impl ContainerFileSystem {
    /// Parse the container stored in `parent`
    ///
    /// # Errors
    /// * Whatever the parser reports
    /// * `OutOfBounds` when an entry points outside the parent stream
    pub fn open(
        type_indicator: TypeIndicator,
        parent: Arc<dyn FileObject>,
        parser: &dyn DirectoryParser,
    ) -> Result<Self> {
        let parent_size = parent.size()?;
        let parsed = parser.parse(parent.as_ref())?;

        let mut entries = BTreeMap::new();
        for mut entry in parsed {
            let end = entry.offset.checked_add(entry.size);
            if end.map_or(true, |end| end > parent_size) {
                return Err(VfsError::out_of_bounds(format!(
                    "{type_indicator} entry {} at {}+{} exceeds container size {parent_size}",
                    entry.path, entry.offset, entry.size
                )));
            }
            if !entry.path.starts_with('/') {
                entry.path.insert(0, '/');
            }
            if entries.contains_key(&entry.path) {
                log::warn!(
                    "{type_indicator} container lists {} more than once, keeping the first",
                    entry.path
                );
                continue;
            }
            entries.insert(entry.path.clone(), entry);
        }

        log::debug!("{type_indicator} container parsed: {} entries", entries.len());
        Ok(Self {
            type_indicator,
            parent,
            entries: RwLock::new(Some(entries)),
        })
    }

    /// The stream the entries point into
    pub fn parent(&self) -> &Arc<dyn FileObject> {
        &self.parent
    }

    fn closed_error(&self) -> VfsError {
        VfsError::closed(format!("{} file system", self.type_indicator))
    }
}

impl FileSystem for ContainerFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator.clone()
    }

    fn entry(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        let guard = self.entries.read();
        let entries = guard.as_ref().ok_or_else(|| self.closed_error())?;
        Ok(entries.get(path).cloned())
    }

    fn entries(&self) -> Result<Vec<DirectoryEntry>> {
        let guard = self.entries.read();
        let entries = guard.as_ref().ok_or_else(|| self.closed_error())?;
        Ok(entries.values().cloned().collect())
    }

    fn close(&self) {
        self.entries.write().take();
    }
}
