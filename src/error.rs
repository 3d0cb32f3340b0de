//! Error types and handling infrastructure for vpath.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! the library error type. The binary layers `anyhow` on top for context.
//!
//! ## Propagation
//!
//! Every error surfaced by the resolution layer is terminal for the request that
//! produced it. Nothing in this crate retries internally; a caller that knows its
//! byte source is transient may retry after releasing other contexts.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed diagnostic produced by an underlying codec library.
pub type CodecSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for vpath operations.
#[derive(Error, Debug)]
pub enum VfsError {
    /// Malformed or incomplete path specification
    #[error("Invalid path specification: {message}")]
    InvalidSpecification { message: String },

    /// No helper or decompressor registered for the requested tag
    #[error("Unsupported {kind}: {tag}")]
    UnsupportedType { kind: &'static str, tag: String },

    /// A helper or decompressor was registered twice for the same tag
    #[error("Duplicate {kind} registration for: {tag}")]
    DuplicateRegistration { kind: &'static str, tag: String },

    /// Resolving a specification re-entered a specification still being resolved
    #[error("Circular path specification: {spec}")]
    CircularSpecification { spec: String },

    /// Underlying decompression library failure (truncated stream, bad checksum, ...)
    #[error("{method} codec error: {message}")]
    CodecError {
        method: String,
        message: String,
        #[source]
        source: Option<CodecSource>,
    },

    /// Nesting depth or open-object limits hit while resolving
    #[error("Resource limit exceeded: {message}")]
    ResourceExhausted { message: String },

    /// File system related errors (file not found, permission denied, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// File not found specifically (common case for user feedback)
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Read or lookup outside the bounds of a stream or container
    #[error("Out of bounds: {message}")]
    OutOfBounds { message: String },

    /// Use of a file object, file system or context after it was closed
    #[error("Closed: {message}")]
    Closed { message: String },

    /// Path specification (de)serialization failures
    #[error("Serialization failed: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// Standard Result type for vpath operations.
pub type Result<T> = std::result::Result<T, VfsError>;

impl VfsError {
    /// Create an InvalidSpecification error with a descriptive message
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpecification {
            message: message.into(),
        }
    }

    /// Create an UnsupportedType error for a resolver type indicator
    pub fn unsupported_type(tag: impl Into<String>) -> Self {
        Self::UnsupportedType {
            kind: "type indicator",
            tag: tag.into(),
        }
    }

    /// Create an UnsupportedType error for a compression method
    pub fn unsupported_compression(tag: impl Into<String>) -> Self {
        Self::UnsupportedType {
            kind: "compression method",
            tag: tag.into(),
        }
    }

    /// Create a CodecError carrying the codec library's own diagnostic
    pub fn codec<E>(method: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CodecError {
            method: method.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a CodecError detected by vpath itself (framing, truncation)
    pub fn codec_message(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CodecError {
            method: method.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a ResourceExhausted error with a descriptive message
    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
        }
    }

    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create an OutOfBounds error with a descriptive message
    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::OutOfBounds {
            message: message.into(),
        }
    }

    /// Create a Closed error with a descriptive message
    pub fn closed(message: impl Into<String>) -> Self {
        Self::Closed {
            message: message.into(),
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

// Automatic conversion from io::Error to VfsError
impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}

impl From<VfsError> for std::io::Error {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::FileError { source, .. } => source,
            VfsError::OutOfBounds { .. } => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err)
            }
            VfsError::CodecError { .. } => std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display_messages() {
        let path = PathBuf::from("/evidence/image.raw");

        let not_found = VfsError::FileNotFound { path };
        assert_eq!(not_found.to_string(), "File not found: /evidence/image.raw");

        let unsupported = VfsError::unsupported_type("QCOW");
        assert_eq!(unsupported.to_string(), "Unsupported type indicator: QCOW");

        let unsupported = VfsError::unsupported_compression("lz4");
        assert_eq!(unsupported.to_string(), "Unsupported compression method: lz4");

        let exhausted = VfsError::exhausted("too deep");
        assert_eq!(exhausted.to_string(), "Resource limit exceeded: too deep");
    }

    #[test]
    fn test_codec_error_keeps_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad header");
        let err = VfsError::codec("zlib", "decompression failed", inner);

        assert_eq!(err.to_string(), "zlib codec error: decompression failed");
        let source = err.source().expect("codec source attached");
        assert_eq!(source.to_string(), "bad header");

        let err = VfsError::codec_message("gzip", "truncated stream");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vfs_err: VfsError = io_err.into();

        match vfs_err {
            VfsError::FileError { message, .. } => {
                assert_eq!(message, "File not found");
            }
            _ => panic!("Expected FileError variant"),
        }
    }

    #[test]
    fn test_into_io_error_kinds() {
        let io: std::io::Error = VfsError::out_of_bounds("past end").into();
        assert_eq!(io.kind(), std::io::ErrorKind::UnexpectedEof);

        let io: std::io::Error = VfsError::codec_message("xz", "corrupt").into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
    }
}
