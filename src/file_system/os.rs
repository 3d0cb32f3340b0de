//! Host file system lookups.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{DirectoryEntry, FileSystem};
use crate::error::{Result, VfsError};
use crate::path_spec::TypeIndicator;

/// Metadata view of the host file system anchored at an `OS` specification path.
///
/// `entry` accepts any host path. `entries` lists the regular files of the
/// anchor when it is a directory, or the anchor itself when it is a file.
#[derive(Debug)]
pub struct OsFileSystem {
    anchor: PathBuf,
    closed: AtomicBool,
}

impl OsFileSystem {
    pub fn new(anchor: impl Into<PathBuf>) -> Self {
        Self {
            anchor: anchor.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn anchor(&self) -> &Path {
        &self.anchor
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VfsError::closed(format!(
                "OS file system at {}",
                self.anchor.display()
            )));
        }
        Ok(())
    }
}

fn file_entry(path: &Path, metadata: &fs::Metadata) -> DirectoryEntry {
    DirectoryEntry::stored(path.to_string_lossy(), 0, metadata.len())
}

impl FileSystem for OsFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Os
    }

    fn entry(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        self.check_open()?;
        let path = Path::new(path);
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => Ok(Some(file_entry(path, &metadata))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VfsError::file_error(
                format!("Failed to get metadata: {}", path.display()),
                e,
            )),
        }
    }

    fn entries(&self) -> Result<Vec<DirectoryEntry>> {
        self.check_open()?;
        let metadata = fs::metadata(&self.anchor).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                VfsError::FileNotFound {
                    path: self.anchor.clone(),
                }
            } else {
                VfsError::file_error(
                    format!("Failed to get metadata: {}", self.anchor.display()),
                    e,
                )
            }
        })?;

        if metadata.is_file() {
            return Ok(vec![file_entry(&self.anchor, &metadata)]);
        }

        let mut entries = Vec::new();
        let listing = fs::read_dir(&self.anchor).map_err(|e| {
            VfsError::file_error(
                format!("Failed to list directory: {}", self.anchor.display()),
                e,
            )
        })?;
        for item in listing {
            let item = item?;
            let metadata = item.metadata()?;
            if metadata.is_file() {
                entries.push(file_entry(&item.path(), &metadata));
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
