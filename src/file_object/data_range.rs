//! Fixed window over a parent stream.

use std::sync::Arc;

use super::{clamp_read, FileObject};
use crate::error::{Result, VfsError};

/// `size` bytes of the parent starting at `offset`.
pub struct DataRangeFileObject {
    parent: Arc<dyn FileObject>,
    offset: u64,
    size: u64,
}

impl DataRangeFileObject {
    /// Create a window, checking that it lies inside the parent
    ///
    /// # Errors
    /// * `OutOfBounds` when `offset + size` exceeds the parent size
    pub fn new(parent: Arc<dyn FileObject>, offset: u64, size: u64) -> Result<Self> {
        let parent_size = parent.size()?;
        let end = offset
            .checked_add(size)
            .ok_or_else(|| VfsError::out_of_bounds(format!("range {offset}+{size} overflows")))?;
        if end > parent_size {
            return Err(VfsError::out_of_bounds(format!(
                "range {offset}+{size} exceeds parent size {parent_size}"
            )));
        }
        Ok(Self {
            parent,
            offset,
            size,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl FileObject for DataRangeFileObject {
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        match clamp_read(offset, size, self.size) {
            Some((start, len)) => self.parent.read_at(self.offset + start, len),
            None => Ok(Vec::new()),
        }
    }

    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}
