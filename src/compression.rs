//! Incremental decompressors and the registry that hands them out.
//!
//! A [`Decompressor`] is fed one chunk of compressed bytes at a time and returns
//! whatever plaintext the codec could produce from it. When the codec reaches the
//! end of its logical stream mid-chunk, the unconsumed tail is handed back as
//! [`Decompressed::remaining`] so the caller can start a fresh decompressor on it
//! (concatenated members).
//!
//! Codec internals are delegated to `flate2`, `bzip2`, `xz2` and `zstd`. Each
//! codec module exposes a `register` function; [`CompressionRegistry::with_defaults`]
//! calls them all.

mod bzip;
mod deflate;
mod detection;
mod gzip;
mod lzma;
mod zstandard;

pub use bzip::Bzip2Decompressor;
pub use deflate::DeflateDecompressor;
pub use detection::{detect_by_extension, detect_compression_method};
pub use gzip::GzipDecompressor;
pub use lzma::LzmaDecompressor;
pub use zstandard::ZstdDecompressor;

use crate::error::{Result, VfsError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Compression method tag.
///
/// Tags are lower-case on the wire. Unknown tags parse to `Custom` and fail at
/// lookup time with `UnsupportedType` unless a decompressor was registered for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompressionMethod {
    /// Raw deflate (RFC 1951)
    Deflate,
    /// Zlib-wrapped deflate (RFC 1950)
    Zlib,
    /// GZIP member (RFC 1952)
    Gzip,
    Bzip2,
    Xz,
    /// Legacy `.lzma` (LZMA alone) format
    Lzma,
    Zstd,
    Custom(String),
}

impl CompressionMethod {
    /// Build a method from a tag, mapping built-in tags to their variants
    pub fn custom(tag: impl Into<String>) -> Self {
        let tag = tag.into().trim().to_ascii_lowercase();
        match tag.as_str() {
            "deflate" => Self::Deflate,
            "zlib" => Self::Zlib,
            "gzip" => Self::Gzip,
            "bzip2" => Self::Bzip2,
            "xz" => Self::Xz,
            "lzma" => Self::Lzma,
            "zstd" => Self::Zstd,
            _ => Self::Custom(tag),
        }
    }

    /// Re-map a `Custom` variant onto the form its tag parses back to
    pub(crate) fn canonical(self) -> Self {
        match self {
            Self::Custom(tag) => Self::custom(tag),
            other => other,
        }
    }

    /// Whether the tag is a non-empty run of printable ASCII without spaces
    pub fn is_well_formed(&self) -> bool {
        is_well_formed_tag(self.as_str())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Deflate => "deflate",
            Self::Zlib => "zlib",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Lzma => "lzma",
            Self::Zstd => "zstd",
            Self::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionMethod {
    type Err = VfsError;

    fn from_str(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(VfsError::invalid_spec("empty compression method"));
        }
        if !is_well_formed_tag(tag) {
            return Err(VfsError::invalid_spec(format!(
                "malformed compression method: {tag:?}"
            )));
        }
        Ok(Self::custom(tag))
    }
}

fn is_well_formed_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.bytes().all(|byte| byte.is_ascii_graphic())
}

impl TryFrom<String> for CompressionMethod {
    type Error = VfsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CompressionMethod> for String {
    fn from(value: CompressionMethod) -> Self {
        value.as_str().to_string()
    }
}

/// Result of feeding one chunk to a [`Decompressor`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decompressed {
    /// Plaintext produced from the chunk
    pub data: Vec<u8>,
    /// Bytes after the end of the logical stream; empty unless the codec finished mid-chunk
    pub remaining: Vec<u8>,
}

impl Decompressed {
    /// Output for a chunk offered after the stream already ended: nothing is consumed
    pub fn after_end(compressed: &[u8]) -> Self {
        Self {
            data: Vec::new(),
            remaining: compressed.to_vec(),
        }
    }
}

/// Stateful, incremental codec adapter.
///
/// Calls on one instance must be serialized by the caller; the state carries over
/// between calls so a stream may be split at any byte boundary.
pub trait Decompressor: Send {
    fn compression_method(&self) -> CompressionMethod;

    /// Decode one chunk of compressed bytes.
    ///
    /// Once [`is_finished`](Self::is_finished) returns true, further calls consume
    /// nothing and return the whole chunk as `remaining`.
    ///
    /// # Errors
    /// * `CodecError` for malformed input; the stream is unusable afterwards
    fn decompress(&mut self, compressed: &[u8]) -> Result<Decompressed>;

    /// Whether the codec has seen the end of its logical stream
    fn is_finished(&self) -> bool;
}

/// Constructor for a fresh decompressor instance
pub type DecompressorFactory = Arc<dyn Fn() -> Result<Box<dyn Decompressor>> + Send + Sync>;

/// Output growth step while draining a codec
pub(crate) const OUTPUT_CHUNK: usize = 32 * 1024;

/// Make sure `output` has at least [`OUTPUT_CHUNK`] bytes of spare capacity
pub(crate) fn reserve_output(output: &mut Vec<u8>) {
    if output.capacity() - output.len() < OUTPUT_CHUNK {
        output.reserve(OUTPUT_CHUNK);
    }
}

/// Whether a drain loop must call the codec again.
///
/// Stops when a pass made no progress, or when all input is consumed and the
/// output buffer was not filled (nothing left pending inside the codec).
pub(crate) fn needs_another_pass(
    consumed: usize,
    available: usize,
    read: usize,
    written: usize,
    output_full: bool,
) -> bool {
    if read == 0 && written == 0 {
        return false;
    }
    consumed < available || output_full
}

/// Registry mapping compression method tags to decompressor factories.
pub struct CompressionRegistry {
    factories: RwLock<HashMap<CompressionMethod, DecompressorFactory>>,
}

impl CompressionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with every built-in codec registered
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        // Built-in tags are distinct, so registration into an empty registry cannot collide
        for register in [
            deflate::register,
            gzip::register,
            bzip::register,
            lzma::register,
            zstandard::register,
        ] {
            if let Err(e) = register(&registry) {
                log::warn!("built-in codec registration failed: {e}");
            }
        }
        registry
    }

    /// Register `factory` for `method`
    ///
    /// # Errors
    /// * `DuplicateRegistration` when `method` already has a factory; the first one stays active
    pub fn register<F>(&self, method: CompressionMethod, factory: F) -> Result<()>
    where
        F: Fn() -> Result<Box<dyn Decompressor>> + Send + Sync + 'static,
    {
        let mut factories = self.factories.write();
        if factories.contains_key(&method) {
            return Err(VfsError::DuplicateRegistration {
                kind: "decompressor",
                tag: method.to_string(),
            });
        }
        log::debug!("registered decompressor for {method}");
        factories.insert(method, Arc::new(factory));
        Ok(())
    }

    /// Instantiate a fresh decompressor for `method`
    ///
    /// # Errors
    /// * `UnsupportedType` when nothing is registered for `method`
    pub fn get_decompressor(&self, method: &CompressionMethod) -> Result<Box<dyn Decompressor>> {
        let factory = self
            .factories
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| VfsError::unsupported_compression(method.as_str()))?;
        factory()
    }

    pub fn is_registered(&self, method: &CompressionMethod) -> bool {
        self.factories.read().contains_key(method)
    }

    /// Registered methods, sorted
    pub fn methods(&self) -> Vec<CompressionMethod> {
        let mut methods: Vec<_> = self.factories.read().keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl Default for CompressionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for CompressionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

/// Decode a complete, single-member buffer with a fresh decompressor.
///
/// # Errors
/// * `CodecError` when the data ends before the codec signals end-of-stream
pub fn decompress_all(
    registry: &CompressionRegistry,
    method: &CompressionMethod,
    compressed: &[u8],
) -> Result<Decompressed> {
    let mut decompressor = registry.get_decompressor(method)?;
    let output = decompressor.decompress(compressed)?;
    if !decompressor.is_finished() {
        return Err(VfsError::codec_message(
            method.as_str(),
            "truncated stream: input ended before end-of-stream marker",
        ));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity {
        finished: bool,
    }

    impl Decompressor for Identity {
        fn compression_method(&self) -> CompressionMethod {
            CompressionMethod::custom("identity")
        }

        fn decompress(&mut self, compressed: &[u8]) -> Result<Decompressed> {
            if self.finished {
                return Ok(Decompressed::after_end(compressed));
            }
            self.finished = true;
            Ok(Decompressed {
                data: compressed.to_vec(),
                remaining: Vec::new(),
            })
        }

        fn is_finished(&self) -> bool {
            self.finished
        }
    }

    #[test]
    fn test_defaults_cover_builtin_methods() {
        let registry = CompressionRegistry::with_defaults();
        assert_eq!(
            registry.methods(),
            vec![
                CompressionMethod::Deflate,
                CompressionMethod::Zlib,
                CompressionMethod::Gzip,
                CompressionMethod::Bzip2,
                CompressionMethod::Xz,
                CompressionMethod::Lzma,
                CompressionMethod::Zstd,
            ]
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = CompressionRegistry::with_defaults();
        let result = registry.register(CompressionMethod::Zlib, || {
            Ok(Box::new(Identity { finished: false }) as Box<dyn Decompressor>)
        });
        assert!(matches!(
            result,
            Err(VfsError::DuplicateRegistration { .. })
        ));

        // The original zlib decompressor is still the one handed out
        let decompressor = registry.get_decompressor(&CompressionMethod::Zlib).unwrap();
        assert_eq!(decompressor.compression_method(), CompressionMethod::Zlib);
    }

    #[test]
    fn test_custom_method_registration() {
        let registry = CompressionRegistry::new();
        let method = CompressionMethod::custom("identity");
        registry
            .register(method.clone(), || {
                Ok(Box::new(Identity { finished: false }) as Box<dyn Decompressor>)
            })
            .unwrap();

        let mut decompressor = registry.get_decompressor(&method).unwrap();
        let output = decompressor.decompress(b"plain").unwrap();
        assert_eq!(output.data, b"plain");

        // Finished decompressors consume nothing
        let output = decompressor.decompress(b"more").unwrap();
        assert!(output.data.is_empty());
        assert_eq!(output.remaining, b"more");
    }

    #[test]
    fn test_unknown_method_unsupported() {
        let registry = CompressionRegistry::with_defaults();
        let result = registry.get_decompressor(&CompressionMethod::custom("lz4"));
        match result {
            Err(VfsError::UnsupportedType { kind, tag }) => {
                assert_eq!(kind, "compression method");
                assert_eq!(tag, "lz4");
            }
            Err(other) => panic!("expected UnsupportedType, got {other:?}"),
            Ok(_) => panic!("expected UnsupportedType"),
        }
    }

    #[test]
    fn test_method_tags_parse_case_insensitively() {
        assert_eq!("BZIP2".parse::<CompressionMethod>().unwrap(), CompressionMethod::Bzip2);
        assert_eq!(CompressionMethod::custom("Zstd"), CompressionMethod::Zstd);
        assert!("".parse::<CompressionMethod>().is_err());
    }
}
