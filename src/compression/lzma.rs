//! XZ and legacy LZMA decompressors backed by `xz2` (liblzma).
//!
//! The two formats run on the same codec and differ only in which liblzma
//! decoder the stream is initialized with.

use xz2::stream::{Action, Status, Stream};

use super::{
    needs_another_pass, reserve_output, CompressionMethod, CompressionRegistry, Decompressed,
    Decompressor,
};
use crate::error::{Result, VfsError};

pub struct LzmaDecompressor {
    method: CompressionMethod,
    stream: Stream,
    finished: bool,
}

impl LzmaDecompressor {
    /// Decoder for `.xz` container streams
    pub fn xz() -> Result<Self> {
        // No CONCATENATED flag: stop at the end of the first stream so the
        // caller sees what follows as remaining data.
        let stream = Stream::new_stream_decoder(u64::MAX, 0)
            .map_err(|e| VfsError::codec("xz", "decoder initialization failed", e))?;
        Ok(Self::with_stream(CompressionMethod::Xz, stream))
    }

    /// Decoder for the legacy `.lzma` (LZMA alone) format
    pub fn lzma() -> Result<Self> {
        let stream = Stream::new_lzma_decoder(u64::MAX)
            .map_err(|e| VfsError::codec("lzma", "decoder initialization failed", e))?;
        Ok(Self::with_stream(CompressionMethod::Lzma, stream))
    }

    fn with_stream(method: CompressionMethod, stream: Stream) -> Self {
        Self {
            method,
            stream,
            finished: false,
        }
    }
}

impl Decompressor for LzmaDecompressor {
    fn compression_method(&self) -> CompressionMethod {
        self.method.clone()
    }

    fn decompress(&mut self, compressed: &[u8]) -> Result<Decompressed> {
        if self.finished {
            return Ok(Decompressed::after_end(compressed));
        }

        let mut data = Vec::with_capacity(compressed.len().saturating_mul(4));
        let mut consumed = 0;
        loop {
            reserve_output(&mut data);
            let in_before = self.stream.total_in();
            let out_before = self.stream.total_out();

            let status = self
                .stream
                .process_vec(&compressed[consumed..], &mut data, Action::Run)
                .map_err(|e| VfsError::codec(self.method.as_str(), "decompression failed", e))?;

            let read = (self.stream.total_in() - in_before) as usize;
            let written = (self.stream.total_out() - out_before) as usize;
            consumed += read;

            match status {
                Status::StreamEnd => {
                    self.finished = true;
                    break;
                }
                Status::MemNeeded => {
                    return Err(VfsError::exhausted(format!(
                        "{} decoder memory limit reached",
                        self.method
                    )));
                }
                Status::Ok | Status::GetCheck => {}
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
    registry.register(CompressionMethod::Xz, || {
        Ok(Box::new(LzmaDecompressor::xz()?) as Box<dyn Decompressor>)
    })?;
    registry.register(CompressionMethod::Lzma, || {
        Ok(Box::new(LzmaDecompressor::lzma()?) as Box<dyn Decompressor>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use xz2::stream::LzmaOptions;
    use xz2::write::XzEncoder;

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn lzma_alone(data: &[u8]) -> Vec<u8> {
        let options = LzmaOptions::new_preset(6).unwrap();
        let stream = Stream::new_lzma_encoder(&options).unwrap();
        let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_xz_chunked() {
        let plaintext = b"kernel: [    0.000000] Linux version 6.1.0\n".repeat(300);
        let compressed = xz(&plaintext);

        let mut decompressor = LzmaDecompressor::xz().unwrap();
        let mut data = Vec::new();
        for chunk in compressed.chunks(64) {
            data.extend_from_slice(&decompressor.decompress(chunk).unwrap().data);
        }
        assert_eq!(data, plaintext);
        assert!(decompressor.is_finished());
    }

    #[test]
    fn test_legacy_lzma_format() {
        let plaintext = b"legacy alone-format payload".repeat(40);
        let mut decompressor = LzmaDecompressor::lzma().unwrap();

        let output = decompressor.decompress(&lzma_alone(&plaintext)).unwrap();
        assert_eq!(output.data, plaintext);
        assert!(decompressor.is_finished());
        assert_eq!(decompressor.compression_method(), CompressionMethod::Lzma);
    }

    #[test]
    fn test_xz_trailing_stream() {
        let second = xz(b"beta");
        let mut joined = xz(b"alpha");
        joined.extend_from_slice(&second);

        let mut decompressor = LzmaDecompressor::xz().unwrap();
        let output = decompressor.decompress(&joined).unwrap();
        assert_eq!(output.data, b"alpha");
        assert_eq!(output.remaining, second);
    }

    #[test]
    fn test_xz_rejects_lzma_alone_input() {
        let mut decompressor = LzmaDecompressor::xz().unwrap();
        let result = decompressor.decompress(&lzma_alone(b"wrong container"));
        assert!(matches!(result, Err(VfsError::CodecError { .. })));
    }
}
