//! Raw deflate and zlib decompressors backed by `flate2`.
//!
//! Both formats share one codec; they differ only in whether the inflater
//! expects a zlib header and Adler-32 trailer.

use flate2::{Decompress, FlushDecompress, Status};

use super::{
    needs_another_pass, reserve_output, CompressionMethod, CompressionRegistry, Decompressed,
    Decompressor,
};
use crate::error::{Result, VfsError};

pub struct DeflateDecompressor {
    method: CompressionMethod,
    inflater: Decompress,
    finished: bool,
}

impl DeflateDecompressor {
    /// Decoder for raw deflate data (no header)
    pub fn raw() -> Self {
        Self::with_header(CompressionMethod::Deflate, false)
    }

    /// Decoder for zlib-wrapped deflate data
    pub fn zlib() -> Self {
        Self::with_header(CompressionMethod::Zlib, true)
    }

    fn with_header(method: CompressionMethod, zlib_header: bool) -> Self {
        Self {
            method,
            inflater: Decompress::new(zlib_header),
            finished: false,
        }
    }
}

impl Decompressor for DeflateDecompressor {
    fn compression_method(&self) -> CompressionMethod {
        self.method.clone()
    }

    fn decompress(&mut self, compressed: &[u8]) -> Result<Decompressed> {
        if self.finished {
            return Ok(Decompressed::after_end(compressed));
        }

        let mut data = Vec::with_capacity(compressed.len().saturating_mul(2));
        let (consumed, ended) = inflate_into(&mut self.inflater, &self.method, compressed, &mut data)?;
        self.finished = ended;

        Ok(Decompressed {
            data,
            remaining: compressed[consumed..].to_vec(),
        })
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Drain `input` through `inflater` into `output`.
///
/// Returns the number of input bytes consumed and whether the deflate stream ended.
pub(crate) fn inflate_into(
    inflater: &mut Decompress,
    method: &CompressionMethod,
    input: &[u8],
    output: &mut Vec<u8>,
) -> Result<(usize, bool)> {
    let mut consumed = 0;
    loop {
        reserve_output(output);
        let in_before = inflater.total_in();
        let out_before = inflater.total_out();

        let status = inflater
            .decompress_vec(&input[consumed..], output, FlushDecompress::None)
            .map_err(|e| VfsError::codec(method.as_str(), "inflate failed", e))?;

        let read = (inflater.total_in() - in_before) as usize;
        let written = (inflater.total_out() - out_before) as usize;
        consumed += read;

        if status == Status::StreamEnd {
            return Ok((consumed, true));
        }
        let output_full = output.len() == output.capacity();
        if !needs_another_pass(consumed, input.len(), read, written, output_full) {
            return Ok((consumed, false));
        }
    }
}

pub fn register(registry: &CompressionRegistry) -> Result<()> {
    registry.register(CompressionMethod::Deflate, || {
        Ok(Box::new(DeflateDecompressor::raw()) as Box<dyn Decompressor>)
    })?;
    registry.register(CompressionMethod::Zlib, || {
        Ok(Box::new(DeflateDecompressor::zlib()) as Box<dyn Decompressor>)
    })
}
