//! In-memory byte source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{clamp_read, FileObject};
use crate::error::{Result, VfsError};

/// File object over a shared in-memory buffer.
///
/// Used as the root of `FAKE` specifications and anywhere a caller already
/// holds the bytes.
#[derive(Debug)]
pub struct MemoryFileObject {
    data: Arc<[u8]>,
    closed: AtomicBool,
}

impl MemoryFileObject {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl FileObject for MemoryFileObject {
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        if self.is_closed() {
            return Err(VfsError::closed("in-memory file object"));
        }
        Ok(match clamp_read(offset, size, self.data.len() as u64) {
            Some((start, len)) => {
                let start = start as usize;
                self.data[start..start + len].to_vec()
            }
            None => Vec::new(),
        })
    }

    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
