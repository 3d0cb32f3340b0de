//! Byte-stream views produced by resolver helpers.
//!
//! A [`FileObject`] is a random-access, read-only view over a stream: an OS file,
//! a window inside a parent stream, a decoded compressed stream, a container member.
//! Objects are shared between every holder of a cache entry, so all methods take
//! `&self` and implementations synchronize internally.

mod compressed_stream;
mod data_range;
mod memory;
mod os;
mod reader;

pub use compressed_stream::CompressedStreamFileObject;
pub use data_range::DataRangeFileObject;
pub use memory::MemoryFileObject;
pub use os::{validate_file_path, ByteSource, OsFileObject};
pub use reader::FileObjectReader;

use crate::error::Result;

/// Random-access byte-stream view.
pub trait FileObject: Send + Sync {
    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes when the range crosses the end of the stream and an
    /// empty buffer when `offset` is at or past the end.
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>>;

    /// Total size of the stream in bytes
    fn size(&self) -> Result<u64>;

    /// Release the underlying handle; later reads fail with `Closed`.
    ///
    /// Called by the resolution context when the last reference is released or
    /// when the context is torn down.
    fn close(&self) {}
}

/// Clamp a read of `size` bytes at `offset` to a stream of `total` bytes
pub(crate) fn clamp_read(offset: u64, size: usize, total: u64) -> Option<(u64, usize)> {
    if offset >= total || size == 0 {
        return None;
    }
    let available = total - offset;
    let len = (size as u64).min(available) as usize;
    Some((offset, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_read() {
        assert_eq!(clamp_read(0, 10, 100), Some((0, 10)));
        assert_eq!(clamp_read(95, 10, 100), Some((95, 5)));
        assert_eq!(clamp_read(100, 10, 100), None);
        assert_eq!(clamp_read(5, 0, 100), None);
    }
}
