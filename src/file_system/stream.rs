//! File system exposing a single stream.
//!
//! Ranges and compressed streams have no directory structure; their file system
//! holds one entry, `/`, covering the whole decoded view.

use parking_lot::RwLock;
use std::sync::Arc;

use super::{DirectoryEntry, FileSystem};
use crate::error::{Result, VfsError};
use crate::file_object::FileObject;
use crate::path_spec::TypeIndicator;

pub struct StreamFileSystem {
    type_indicator: TypeIndicator,
    stream: RwLock<Option<Arc<dyn FileObject>>>,
}

impl StreamFileSystem {
    pub const ROOT: &'static str = "/";

    pub fn new(type_indicator: TypeIndicator, stream: Arc<dyn FileObject>) -> Self {
        Self {
            type_indicator,
            stream: RwLock::new(Some(stream)),
        }
    }

    fn root_entry(&self) -> Result<DirectoryEntry> {
        let stream = self
            .stream
            .read()
            .clone()
            .ok_or_else(|| VfsError::closed(format!("{} file system", self.type_indicator)))?;
        Ok(DirectoryEntry::stored(Self::ROOT, 0, stream.size()?))
    }
}

impl FileSystem for StreamFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator.clone()
    }

    fn entry(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        if path != Self::ROOT {
            return Ok(None);
        }
        self.root_entry().map(Some)
    }

    fn entries(&self) -> Result<Vec<DirectoryEntry>> {
        Ok(vec![self.root_entry()?])
    }

    fn close(&self) {
        self.stream.write().take();
    }
}
