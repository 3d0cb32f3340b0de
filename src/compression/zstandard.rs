//! Zstandard frame decompressor backed by the `zstd` streaming API.

use zstd::stream::raw::{Decoder, InBuffer, Operation, OutBuffer};

use super::{CompressionMethod, CompressionRegistry, Decompressed, Decompressor, OUTPUT_CHUNK};
use crate::error::{Result, VfsError};

pub struct ZstdDecompressor {
    decoder: Decoder<'static>,
    scratch: Vec<u8>,
    finished: bool,
}

impl ZstdDecompressor {
    pub fn new() -> Result<Self> {
        let decoder = Decoder::new()
            .map_err(|e| VfsError::codec("zstd", "decoder initialization failed", e))?;
        Ok(Self {
            decoder,
            scratch: vec![0u8; OUTPUT_CHUNK],
            finished: false,
        })
    }
}

impl Decompressor for ZstdDecompressor {
    fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }

    fn decompress(&mut self, compressed: &[u8]) -> Result<Decompressed> {
        if self.finished {
            return Ok(Decompressed::after_end(compressed));
        }

        let mut input = InBuffer::around(compressed);
        let mut data = Vec::new();
        loop {
            let in_before = input.pos;
            let (hint, written) = {
                let mut output = OutBuffer::around(self.scratch.as_mut_slice());
                let hint = self
                    .decoder
                    .run(&mut input, &mut output)
                    .map_err(|e| VfsError::codec("zstd", "decompression failed", e))?;
                (hint, output.pos())
            };
            data.extend_from_slice(&self.scratch[..written]);

            // A zero hint means the frame is fully decoded and flushed
            if hint == 0 {
                self.finished = true;
                break;
            }
            let read = input.pos - in_before;
            if read == 0 && written == 0 {
                break;
            }
            if input.pos == compressed.len() && written < self.scratch.len() {
                break;
            }
        }

        Ok(Decompressed {
            data,
            remaining: compressed[input.pos..].to_vec(),
        })
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

pub fn register(registry: &CompressionRegistry) -> Result<()> {
    registry.register(CompressionMethod::Zstd, || {
        Ok(Box::new(ZstdDecompressor::new()?) as Box<dyn Decompressor>)
    })
}
