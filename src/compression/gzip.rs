//! GZIP member decompressor (RFC 1952).
//!
//! One instance decodes one member: header, raw deflate body, then the CRC-32 and
//! ISIZE trailer. Header and trailer bytes may arrive split across calls; they are
//! buffered until complete. Bytes after the trailer are returned as `remaining`,
//! which is where the next member of a multi-member file starts.

use flate2::{Crc, Decompress};

use super::deflate::inflate_into;
use super::{CompressionMethod, CompressionRegistry, Decompressed, Decompressor};
use crate::error::{Result, VfsError};

const MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;
const FIXED_HEADER_LEN: usize = 10;
const TRAILER_LEN: usize = 8;

const FLAG_HCRC: u8 = 0x02;
const FLAG_EXTRA: u8 = 0x04;
const FLAG_NAME: u8 = 0x08;
const FLAG_COMMENT: u8 = 0x10;
const FLAG_RESERVED: u8 = 0xe0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Body,
    Trailer,
    Done,
}

pub struct GzipDecompressor {
    stage: Stage,
    /// Partial header or trailer bytes carried over between calls
    pending: Vec<u8>,
    inflater: Decompress,
    crc: Crc,
}

impl GzipDecompressor {
    pub fn new() -> Self {
        Self {
            stage: Stage::Header,
            pending: Vec::new(),
            inflater: Decompress::new(false),
            crc: Crc::new(),
        }
    }

    fn verify_trailer(&self, trailer: &[u8]) -> Result<()> {
        let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let expected_size = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);

        if expected_crc != self.crc.sum() {
            return Err(VfsError::codec_message(
                "gzip",
                format!(
                    "CRC-32 mismatch: stored {expected_crc:#010x}, computed {:#010x}",
                    self.crc.sum()
                ),
            ));
        }
        if expected_size != self.crc.amount() {
            return Err(VfsError::codec_message(
                "gzip",
                format!(
                    "size mismatch: stored {expected_size}, decoded {}",
                    self.crc.amount()
                ),
            ));
        }
        Ok(())
    }
}

impl Default for GzipDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for GzipDecompressor {
    fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::Gzip
    }

    fn decompress(&mut self, compressed: &[u8]) -> Result<Decompressed> {
        if self.stage == Stage::Done {
            return Ok(Decompressed::after_end(compressed));
        }

        let joined;
        let mut input: &[u8] = if self.pending.is_empty() {
            compressed
        } else {
            self.pending.extend_from_slice(compressed);
            joined = std::mem::take(&mut self.pending);
            &joined
        };
        let mut data = Vec::new();

        loop {
            match self.stage {
                Stage::Header => match parse_header(input)? {
                    Some(header_len) => {
                        input = &input[header_len..];
                        self.stage = Stage::Body;
                    }
                    None => {
                        self.pending.extend_from_slice(input);
                        return Ok(Decompressed {
                            data,
                            remaining: Vec::new(),
                        });
                    }
                },
                Stage::Body => {
                    let body_start = data.len();
                    let (consumed, ended) = inflate_into(
                        &mut self.inflater,
                        &CompressionMethod::Gzip,
                        input,
                        &mut data,
                    )?;
                    self.crc.update(&data[body_start..]);
                    input = &input[consumed..];

                    if !ended {
                        return Ok(Decompressed {
                            data,
                            remaining: Vec::new(),
                        });
                    }
                    self.stage = Stage::Trailer;
                }
                Stage::Trailer => {
                    if input.len() < TRAILER_LEN {
                        self.pending.extend_from_slice(input);
                        return Ok(Decompressed {
                            data,
                            remaining: Vec::new(),
                        });
                    }
                    self.verify_trailer(&input[..TRAILER_LEN])?;
                    self.stage = Stage::Done;
                    return Ok(Decompressed {
                        data,
                        remaining: input[TRAILER_LEN..].to_vec(),
                    });
                }
                Stage::Done => {
                    return Ok(Decompressed {
                        data,
                        remaining: input.to_vec(),
                    });
                }
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }
}

/// Length of the member header at the start of `buf`, or `None` if more bytes are needed
fn parse_header(buf: &[u8]) -> Result<Option<usize>> {
    if buf.len() >= MAGIC.len() && buf[..MAGIC.len()] != MAGIC {
        return Err(VfsError::codec_message("gzip", "missing member signature"));
    }
    if buf.len() < FIXED_HEADER_LEN {
        return Ok(None);
    }
    if buf[2] != METHOD_DEFLATE {
        return Err(VfsError::codec_message(
            "gzip",
            format!("unsupported member compression method {}", buf[2]),
        ));
    }

    let flags = buf[3];
    if flags & FLAG_RESERVED != 0 {
        return Err(VfsError::codec_message(
            "gzip",
            format!("reserved header flags set: {flags:#04x}"),
        ));
    }

    let mut pos = FIXED_HEADER_LEN;
    if flags & FLAG_EXTRA != 0 {
        let Some(len_bytes) = buf.get(pos..pos + 2) else {
            return Ok(None);
        };
        let extra_len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
        pos += 2 + extra_len;
        if buf.len() < pos {
            return Ok(None);
        }
    }
    for flag in [FLAG_NAME, FLAG_COMMENT] {
        if flags & flag != 0 {
            match buf[pos..].iter().position(|&b| b == 0) {
                Some(terminator) => pos += terminator + 1,
                None => return Ok(None),
            }
        }
    }
    if flags & FLAG_HCRC != 0 {
        pos += 2;
        if buf.len() < pos {
            return Ok(None);
        }
    }
    Ok(Some(pos))
}

pub fn register(registry: &CompressionRegistry) -> Result<()> {
    registry.register(CompressionMethod::Gzip, || {
        Ok(Box::new(GzipDecompressor::new()) as Box<dyn Decompressor>)
    })
}
