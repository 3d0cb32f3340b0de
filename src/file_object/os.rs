//! File objects backed by files on the host operating system.
//!
//! Small files are read into memory; large files are memory-mapped. The switch
//! point is [`ResolverConfig::memory_map_threshold`](crate::config::ResolverConfig).

use memmap2::Mmap;
use parking_lot::RwLock;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{clamp_read, FileObject};
use crate::error::{Result, VfsError};

/// Byte source strategy for an [`OsFileObject`]
#[derive(Debug)]
pub enum ByteSource {
    /// Content loaded entirely into memory
    InMemory(Vec<u8>),
    /// Content accessed via memory mapping
    MemoryMapped(Mmap),
}

impl ByteSource {
    /// Get the underlying bytes as a slice regardless of storage strategy
    fn as_bytes(&self) -> &[u8] {
        match self {
            ByteSource::InMemory(vec) => vec.as_slice(),
            ByteSource::MemoryMapped(mmap) => &mmap[..],
        }
    }
}

/// Random access view over a host file.
#[derive(Debug)]
pub struct OsFileObject {
    path: PathBuf,
    file_size: u64,
    /// `None` once closed
    source: RwLock<Option<ByteSource>>,
}

impl OsFileObject {
    /// Open `path`, choosing the byte source strategy by file size
    ///
    /// # Errors
    /// * `FileNotFound` when the path does not exist
    /// * `FileError` when the path is not a regular file or cannot be read or mapped
    pub fn open(path: impl AsRef<Path>, memory_map_threshold: u64) -> Result<Self> {
        let path = path.as_ref();
        validate_file_path(path)?;

        let mut file = File::open(path).map_err(|e| {
            VfsError::file_error(format!("Failed to open file: {}", path.display()), e)
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| VfsError::file_error("Failed to get file metadata", e))?
            .len();

        // Empty files cannot be mapped on every platform
        let source = if file_size < memory_map_threshold || file_size == 0 {
            let mut content = Vec::with_capacity(file_size as usize);
            file.read_to_end(&mut content)
                .map_err(|e| VfsError::file_error("Failed to read file", e))?;
            ByteSource::InMemory(content)
        } else {
            let mmap = unsafe {
                Mmap::map(&file).map_err(|e| {
                    VfsError::file_error(
                        format!("Failed to memory map file: {}", path.display()),
                        e,
                    )
                })?
            };
            ByteSource::MemoryMapped(mmap)
        };

        log::debug!(
            "opened {} ({} bytes, {})",
            path.display(),
            file_size,
            if matches!(source, ByteSource::InMemory(_)) {
                "in memory"
            } else {
                "memory mapped"
            }
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_size,
            source: RwLock::new(Some(source)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_memory_mapped(&self) -> bool {
        matches!(*self.source.read(), Some(ByteSource::MemoryMapped(_)))
    }
}

impl FileObject for OsFileObject {
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let guard = self.source.read();
        let source = guard
            .as_ref()
            .ok_or_else(|| VfsError::closed(format!("OS file {}", self.path.display())))?;

        let bytes = source.as_bytes();
        Ok(match clamp_read(offset, size, bytes.len() as u64) {
            Some((start, len)) => {
                let start = start as usize;
                bytes[start..start + len].to_vec()
            }
            None => Vec::new(),
        })
    }

    fn size(&self) -> Result<u64> {
        Ok(self.file_size)
    }

    fn close(&self) {
        if self.source.write().take().is_some() {
            log::debug!("closed {}", self.path.display());
        }
    }
}

/// Validate that a file path exists and is a regular file
pub fn validate_file_path(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VfsError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            VfsError::file_error(
                format!("Failed to read file metadata: {}", path.display()),
                e,
            )
        }
    })?;

    if !metadata.is_file() {
        return Err(VfsError::file_error(
            format!("Path is not a file: {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Not a file"),
        ));
    }

    Ok(())
}
