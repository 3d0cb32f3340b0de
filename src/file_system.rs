//! Directory and metadata views produced by resolver helpers.
//!
//! Listing and metadata semantics are kept to what resolution needs: which inner
//! paths exist and where their bytes live in the parent stream.

mod container;
mod memory;
mod os;
mod stream;

pub use container::{ContainerFileSystem, DirectoryParser};
pub use memory::MemoryFileSystem;
pub use os::OsFileSystem;
pub use stream::StreamFileSystem;

use crate::compression::CompressionMethod;
use crate::error::Result;
use crate::path_spec::TypeIndicator;

/// One entry of a file system: an inner path and where its bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Absolute inner path (`/dir/file`)
    pub path: String,
    /// Offset of the entry's bytes in the parent stream
    pub offset: u64,
    /// Number of bytes the entry occupies in the parent stream
    pub size: u64,
    /// Codec applied to the stored bytes, if any
    pub compression_method: Option<CompressionMethod>,
}

impl DirectoryEntry {
    /// Entry stored verbatim at `offset..offset + size`
    pub fn stored(path: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            path: path.into(),
            offset,
            size,
            compression_method: None,
        }
    }

    /// Entry whose `size` stored bytes are compressed with `method`
    pub fn compressed(
        path: impl Into<String>,
        offset: u64,
        size: u64,
        method: CompressionMethod,
    ) -> Self {
        Self {
            compression_method: Some(method),
            ..Self::stored(path, offset, size)
        }
    }
}

/// Directory/metadata view of a resolved specification.
pub trait FileSystem: Send + Sync {
    fn type_indicator(&self) -> TypeIndicator;

    /// Look up one inner path
    fn entry(&self, path: &str) -> Result<Option<DirectoryEntry>>;

    /// All entries, sorted by path
    fn entries(&self) -> Result<Vec<DirectoryEntry>>;

    fn file_entry_exists(&self, path: &str) -> Result<bool> {
        Ok(self.entry(path)?.is_some())
    }

    /// Release underlying resources
    fn close(&self) {}
}
