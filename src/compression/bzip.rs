//! BZIP2 decompressor backed by the `bzip2` crate.

use bzip2::{Decompress, Status};

use super::{
    needs_another_pass, reserve_output, CompressionMethod, CompressionRegistry, Decompressed,
    Decompressor,
};
use crate::error::{Result, VfsError};

pub struct Bzip2Decompressor {
    inner: Decompress,
    finished: bool,
}

impl Bzip2Decompressor {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            finished: false,
        }
    }
}

impl Default for Bzip2Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for Bzip2Decompressor {
    fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::Bzip2
    }

    fn decompress(&mut self, compressed: &[u8]) -> Result<Decompressed> {
        if self.finished {
            return Ok(Decompressed::after_end(compressed));
        }

        let mut data = Vec::with_capacity(compressed.len().saturating_mul(4));
        let mut consumed = 0;
        loop {
            reserve_output(&mut data);
            let in_before = self.inner.total_in();
            let out_before = self.inner.total_out();

            let status = self
                .inner
                .decompress_vec(&compressed[consumed..], &mut data)
                .map_err(|e| VfsError::codec("bzip2", "decompression failed", e))?;

            let read = (self.inner.total_in() - in_before) as usize;
            let written = (self.inner.total_out() - out_before) as usize;
            consumed += read;

            if matches!(status, Status::StreamEnd) {
                self.finished = true;
                break;
            }
            let output_full = data.len() == data.capacity();
            if !needs_another_pass(consumed, compressed.len(), read, written, output_full) {
                break;
            }
        }

        Ok(Decompressed {
            data,
            remaining: compressed[consumed..].to_vec(),
        })
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

pub fn register(registry: &CompressionRegistry) -> Result<()> {
    registry.register(CompressionMethod::Bzip2, || {
        Ok(Box::new(Bzip2Decompressor::new()) as Box<dyn Decompressor>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use std::io::Write;

    fn bzip2(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_chunked_stream() {
        let plaintext = b"Jan  1 00:00:01 host sshd[42]: Accepted publickey\n".repeat(200);
        let compressed = bzip2(&plaintext);

        let mut decompressor = Bzip2Decompressor::new();
        let mut data = Vec::new();
        for chunk in compressed.chunks(37) {
            data.extend_from_slice(&decompressor.decompress(chunk).unwrap().data);
        }
        assert_eq!(data, plaintext);
        assert!(decompressor.is_finished());
    }

    #[test]
    fn test_concatenated_streams() {
        let second = bzip2(b"second stream");
        let mut joined = bzip2(b"first stream");
        joined.extend_from_slice(&second);

        let mut decompressor = Bzip2Decompressor::new();
        let output = decompressor.decompress(&joined).unwrap();
        assert_eq!(output.data, b"first stream");
        assert_eq!(output.remaining, second);
    }

    #[test]
    fn test_garbage_is_codec_error() {
        let mut decompressor = Bzip2Decompressor::new();
        let result = decompressor.decompress(b"BZh9 this is not a bzip2 block at all");
        assert!(matches!(result, Err(VfsError::CodecError { .. })));
    }
}
