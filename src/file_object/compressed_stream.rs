//! Lazily decoded view over a compressed parent stream.
//!
//! Decoding runs forward only. The object keeps a window of decoded bytes
//! starting at the lowest offset still needed; a read behind the window restarts
//! decoding from the first compressed byte. When a decompressor finishes with
//! compressed bytes left over, those bytes start the next member and are offered
//! to a fresh decompressor, so concatenated members read as one stream.

use parking_lot::Mutex;
use std::sync::Arc;

use super::FileObject;
use crate::compression::{CompressionMethod, CompressionRegistry, Decompressor};
use crate::error::{Result, VfsError};

struct DecodeState {
    /// Decompressor for the member in progress; `None` between members
    decompressor: Option<Box<dyn Decompressor>>,
    /// Next parent offset to read compressed bytes from
    compressed_offset: u64,
    /// Compressed bytes left over by the previous member
    carry: Vec<u8>,
    /// Uncompressed offset of `window[0]`
    window_start: u64,
    window: Vec<u8>,
    at_end: bool,
    members: usize,
    total_size: Option<u64>,
    closed: bool,
}

impl DecodeState {
    fn new() -> Self {
        Self {
            decompressor: None,
            compressed_offset: 0,
            carry: Vec::new(),
            window_start: 0,
            window: Vec::new(),
            at_end: false,
            members: 0,
            total_size: None,
            closed: false,
        }
    }

    fn window_end(&self) -> u64 {
        self.window_start + self.window.len() as u64
    }

    /// Forget decoded bytes before `offset`
    fn discard_before(&mut self, offset: u64) {
        if offset > self.window_start {
            let drop = ((offset - self.window_start) as usize).min(self.window.len());
            self.window.drain(..drop);
            self.window_start += drop as u64;
        }
    }

    /// Restart decoding from the first compressed byte; a known size is kept
    fn rewind(&mut self) {
        let total_size = self.total_size;
        *self = Self::new();
        self.total_size = total_size;
    }
}

/// Uncompressed view of a parent stream.
pub struct CompressedStreamFileObject {
    parent: Arc<dyn FileObject>,
    method: CompressionMethod,
    registry: Arc<CompressionRegistry>,
    chunk_size: usize,
    state: Mutex<DecodeState>,
}

impl CompressedStreamFileObject {
    /// Create the view and decode the first chunk.
    ///
    /// # Errors
    /// * `UnsupportedType` when no decompressor is registered for `method`
    /// * `CodecError` when the first chunk does not decode
    pub fn new(
        parent: Arc<dyn FileObject>,
        method: CompressionMethod,
        registry: Arc<CompressionRegistry>,
        chunk_size: usize,
    ) -> Result<Self> {
        let object = Self {
            parent,
            method,
            registry,
            chunk_size: chunk_size.max(1),
            state: Mutex::new(DecodeState::new()),
        };
        {
            let mut state = object.state.lock();
            object.advance(&mut state)?;
        }
        Ok(object)
    }

    pub fn compression_method(&self) -> &CompressionMethod {
        &self.method
    }

    /// Number of members fully decoded since the last restart
    pub fn members_decoded(&self) -> usize {
        self.state.lock().members
    }

    /// Decode one more chunk into the window, restarting from scratch on failure
    fn advance(&self, state: &mut DecodeState) -> Result<()> {
        let result = self.decode_chunk(state);
        if result.is_err() {
            state.rewind();
        }
        result
    }

    fn decode_chunk(&self, state: &mut DecodeState) -> Result<()> {
        let input = if state.carry.is_empty() {
            let chunk = self.parent.read_at(state.compressed_offset, self.chunk_size)?;
            state.compressed_offset += chunk.len() as u64;
            chunk
        } else {
            std::mem::take(&mut state.carry)
        };

        if input.is_empty() {
            if state.decompressor.is_some() {
                return Err(VfsError::codec_message(
                    self.method.as_str(),
                    format!(
                        "truncated stream: input ended after {} bytes before end-of-stream",
                        state.compressed_offset
                    ),
                ));
            }
            state.at_end = true;
            state.total_size = Some(state.window_end());
            return Ok(());
        }

        let decompressor = match state.decompressor.as_mut() {
            Some(decompressor) => decompressor,
            None => {
                if state.members > 0 {
                    log::trace!(
                        "{} member {} starts at decoded offset {}",
                        self.method,
                        state.members + 1,
                        state.window_end()
                    );
                }
                state
                    .decompressor
                    .insert(self.registry.get_decompressor(&self.method)?)
            }
        };

        let output = decompressor.decompress(&input)?;
        let finished = decompressor.is_finished();
        if !finished && output.data.is_empty() && output.remaining.len() >= input.len() {
            return Err(VfsError::codec_message(
                self.method.as_str(),
                "decompressor made no progress on its input",
            ));
        }
        state.window.extend_from_slice(&output.data);

        // Unconsumed bytes go back to the same decompressor, or start the next member
        if finished {
            state.decompressor = None;
            state.members += 1;
        }
        state.carry = output.remaining;
        Ok(())
    }
}

impl FileObject for CompressedStreamFileObject {
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(VfsError::closed(format!("{} compressed stream", self.method)));
        }
        if size == 0 {
            return Ok(Vec::new());
        }

        if offset < state.window_start {
            log::trace!(
                "{} stream rewinding from {} to read at {}",
                self.method,
                state.window_start,
                offset
            );
            state.rewind();
        }

        let end = offset.saturating_add(size as u64);
        loop {
            state.discard_before(offset);
            if state.window_end() >= end || state.at_end {
                break;
            }
            self.advance(&mut state)?;
        }

        if offset >= state.window_end() {
            return Ok(Vec::new());
        }
        let start = (offset - state.window_start) as usize;
        let stop = (end.min(state.window_end()) - state.window_start) as usize;
        Ok(state.window[start..stop].to_vec())
    }

    fn size(&self) -> Result<u64> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(VfsError::closed(format!("{} compressed stream", self.method)));
        }
        if let Some(size) = state.total_size {
            return Ok(size);
        }

        while !state.at_end {
            // Only the count matters here; keep memory flat
            let decoded = state.window_end();
            state.discard_before(decoded);
            self.advance(&mut state)?;
        }
        Ok(state.total_size.unwrap_or_else(|| state.window_end()))
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.rewind();
        state.closed = true;
    }
}
