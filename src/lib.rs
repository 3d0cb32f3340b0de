//! # vpath - Virtual path resolution for nested byte streams
//!
//! Turns a serializable description of where a byte stream lives (possibly
//! nested inside archives, disk images or compressed containers) into lazily
//! constructed, cached file objects and file systems.
//!
//! ## Architecture
//!
//! - [`path_spec`] - Typed, recursively composable path specifications
//! - [`compression`] - Incremental decompressors and their registry
//! - [`file_object`] - Random-access byte-stream views
//! - [`file_system`] - Directory/metadata views and the container parser seam
//! - [`resolver`] - Resolver helpers, the helper registry and resolution contexts
//! - [`config`] - Resolver limits and tuning
//! - [`error`] - Centralized error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use vpath::{FileObjectReader, PathSpec, ResolutionContext, ResolverRegistry};
//!
//! # fn main() -> vpath::Result<()> {
//! let spec = PathSpec::gzip(PathSpec::os("/var/log/syslog.2.gz")?)?;
//! let context = ResolutionContext::with_registry(ResolverRegistry::global());
//!
//! let object = context.resolve_file_object(&spec)?;
//! let mut text = String::new();
//! FileObjectReader::new(object).read_to_string(&mut text)?;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;

// Addressing and codecs
pub mod compression;
pub mod path_spec;

// Resolved views
pub mod file_object;
pub mod file_system;

// Resolution
pub mod resolver;

// Re-export commonly used types for convenience
pub use error::{Result, VfsError};

// Public API surface for external usage
pub use compression::{CompressionMethod, CompressionRegistry, Decompressed, Decompressor};
pub use config::ResolverConfig;
pub use file_object::{FileObject, FileObjectReader};
pub use file_system::{DirectoryEntry, DirectoryParser, FileSystem};
pub use path_spec::{Location, PathSpec, TypeIndicator};
pub use resolver::{
    FileObjectHandle, FileSystemHandle, ResolutionContext, ResolveRequest, ResolverHelper,
    ResolverRegistry,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
