//! `std::io` adapter for file objects.

use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Deref;

use super::FileObject;

/// Cursor over a file object implementing [`Read`] and [`Seek`].
///
/// Generic over anything that dereferences to a file object, so it works with
/// resolver handles as well as plain `Arc<dyn FileObject>`.
pub struct FileObjectReader<F> {
    object: F,
    position: u64,
}

impl<F> FileObjectReader<F>
where
    F: Deref,
    F::Target: FileObject,
{
    pub fn new(object: F) -> Self {
        Self {
            object,
            position: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> F {
        self.object
    }
}

impl<F> Read for FileObjectReader<F>
where
    F: Deref,
    F::Target: FileObject,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.object.read_at(self.position, buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        self.position += data.len() as u64;
        Ok(data.len())
    }
}

impl<F> Seek for FileObjectReader<F>
where
    F: Deref,
    F::Target: FileObject,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::End(delta) => (self.object.size()?, delta),
            SeekFrom::Current(delta) => (self.position, delta),
        };
        match base.checked_add_signed(delta) {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_object::MemoryFileObject;
    use std::sync::Arc;

    #[test]
    fn test_read_to_end() {
        let object: Arc<dyn FileObject> = Arc::new(MemoryFileObject::new(b"line one\nline two\n".to_vec()));
        let mut reader = FileObjectReader::new(object);

        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "line one\nline two\n");
        assert_eq!(reader.position(), 18);
    }

    #[test]
    fn test_seek_variants() {
        let object = Arc::new(MemoryFileObject::new(b"0123456789".to_vec()));
        let mut reader = FileObjectReader::new(object);

        assert_eq!(reader.seek(SeekFrom::End(-3)).unwrap(), 7);
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"78");

        assert_eq!(reader.seek(SeekFrom::Current(-5)).unwrap(), 4);
        assert!(reader.seek(SeekFrom::Current(-10)).is_err());
        assert_eq!(reader.position(), 4);
    }
}
