//! Path specifications: typed, recursively composable storage locations.
//!
//! A [`PathSpec`] is a chain of segments from a root byte source (an OS file or
//! a fake in-memory source) to a leaf, e.g. `OS -> ZIP member -> COMPRESSED_STREAM`.
//! Specifications are immutable once built and compare and hash structurally,
//! which is what lets a [`ResolutionContext`](crate::resolver::ResolutionContext)
//! use them as cache keys.

mod location;
mod serialization;
mod type_indicator;

pub use location::Location;
pub use serialization::PathSpecRecord;
pub use type_indicator::TypeIndicator;

use crate::compression::CompressionMethod;
use crate::error::{Result, VfsError};
use std::fmt;

/// Immutable description of where a byte stream lives.
///
/// Equality and hashing cover the type indicator, the location parameters and
/// the whole parent chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSpec {
    type_indicator: TypeIndicator,
    location: Location,
    parent: Option<Box<PathSpec>>,
}

impl PathSpec {
    /// Upper bound on chain length accepted at construction.
    ///
    /// Resolution applies the tighter, configurable
    /// [`ResolverConfig::max_depth`](crate::config::ResolverConfig).
    pub const MAX_CHAIN_LENGTH: usize = 256;

    /// Build a specification, validating `location` against `type_indicator`
    ///
    /// # Errors
    /// * `InvalidSpecification` when a required parameter is missing, a parameter
    ///   does not belong to the type, a non-root type has no parent, or the chain
    ///   is longer than [`Self::MAX_CHAIN_LENGTH`]
    pub fn new(
        type_indicator: TypeIndicator,
        location: Location,
        parent: Option<PathSpec>,
    ) -> Result<Self> {
        let type_indicator = type_indicator.canonical();
        let mut location = location;
        location.compression_method = location.compression_method.map(CompressionMethod::canonical);
        validate_location(&type_indicator, &location)?;

        // Container inner paths are rooted, matching the parsed directory
        if type_indicator.is_container() {
            if let Some(path) = location.path.as_mut().filter(|path| !path.starts_with('/')) {
                path.insert(0, '/');
            }
        }

        match &parent {
            None if !type_indicator.is_root() => {
                return Err(VfsError::invalid_spec(format!(
                    "{type_indicator} path specification requires a parent"
                )));
            }
            Some(parent) if parent.depth() >= Self::MAX_CHAIN_LENGTH => {
                return Err(VfsError::invalid_spec(format!(
                    "path specification chain longer than {}",
                    Self::MAX_CHAIN_LENGTH
                )));
            }
            _ => {}
        }

        Ok(Self {
            type_indicator,
            location,
            parent: parent.map(Box::new),
        })
    }

    /// Root specification for a file on the host operating system
    pub fn os(path: impl Into<String>) -> Result<Self> {
        Self::new(TypeIndicator::Os, Location::new().with_path(path), None)
    }

    /// Root specification for an in-memory source registered with a fake helper
    pub fn fake(path: impl Into<String>) -> Result<Self> {
        Self::new(TypeIndicator::Fake, Location::new().with_path(path), None)
    }

    /// Window of `size` bytes starting at `offset` in the parent stream
    pub fn data_range(parent: PathSpec, offset: u64, size: u64) -> Result<Self> {
        Self::new(
            TypeIndicator::DataRange,
            Location::new().with_range(offset, size),
            Some(parent),
        )
    }

    /// Parent stream decoded with `method`
    pub fn compressed_stream(parent: PathSpec, method: CompressionMethod) -> Result<Self> {
        Self::new(
            TypeIndicator::CompressedStream,
            Location::new().with_compression_method(method),
            Some(parent),
        )
    }

    /// GZIP members over the parent stream
    pub fn gzip(parent: PathSpec) -> Result<Self> {
        Self::new(TypeIndicator::Gzip, Location::new(), Some(parent))
    }

    /// Member `inner_path` of a container of type `type_indicator`
    pub fn container_member(
        type_indicator: TypeIndicator,
        parent: PathSpec,
        inner_path: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            type_indicator,
            Location::new().with_path(inner_path),
            Some(parent),
        )
    }

    pub fn type_indicator(&self) -> &TypeIndicator {
        &self.type_indicator
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn parent(&self) -> Option<&PathSpec> {
        self.parent.as_deref()
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Number of segments in the chain, counting this one
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// This specification followed by its parents up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = &PathSpec> {
        std::iter::successors(Some(self), |spec| spec.parent())
    }

    /// The rootless segment at the bottom of the chain
    pub fn root(&self) -> &PathSpec {
        self.ancestors().last().unwrap_or(self)
    }

    /// Specification identifying the file system that contains this segment.
    ///
    /// Same type and parent, location reduced to the container root `/` (the
    /// password, if any, is kept since opening the container needs it). Every
    /// member of one container maps to the same file system specification.
    pub fn container_root(&self) -> PathSpec {
        let mut location = Location::new().with_path("/");
        location.password = self.location.password.clone();
        Self {
            type_indicator: self.type_indicator.clone(),
            location,
            parent: self.parent.clone(),
        }
    }
}

/// Check the location parameters required and allowed for each built-in type
fn validate_location(type_indicator: &TypeIndicator, location: &Location) -> Result<()> {
    let (required, optional): (&[&str], &[&str]) = match type_indicator {
        TypeIndicator::Os | TypeIndicator::Fake => (&["path"], &[]),
        TypeIndicator::DataRange => (&["range_offset", "range_size"], &[]),
        TypeIndicator::CompressedStream => (&["compression_method"], &[]),
        TypeIndicator::Gzip => (&[], &[]),
        TypeIndicator::Zip | TypeIndicator::Tar => (&["path"], &["password"]),
        // Third-party helpers validate their own parameters
        TypeIndicator::Custom(_) => return Ok(()),
    };

    let present = location.present_fields();
    for field in required {
        if !present.contains(field) {
            return Err(VfsError::invalid_spec(format!(
                "{type_indicator} path specification requires `{field}`"
            )));
        }
    }
    for field in &present {
        if !required.contains(field) && !optional.contains(field) {
            return Err(VfsError::invalid_spec(format!(
                "`{field}` is not a parameter of {type_indicator}"
            )));
        }
    }

    if let Some(path) = &location.path {
        if path.is_empty() {
            return Err(VfsError::invalid_spec(format!(
                "{type_indicator} path specification has an empty path"
            )));
        }
    }

    // Well-formed but unregistered tags fail at resolution with `UnsupportedType`
    if let Some(method) = location.compression_method.as_ref().filter(|m| !m.is_well_formed()) {
        return Err(VfsError::invalid_spec(format!(
            "{type_indicator} has a malformed compression method: {:?}",
            method.as_str()
        )));
    }

    if let (Some(offset), Some(size)) = (location.range_offset, location.range_size) {
        if offset.checked_add(size).is_none() {
            return Err(VfsError::invalid_spec(format!(
                "data range {offset}+{size} overflows"
            )));
        }
    }

    Ok(())
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments: Vec<&PathSpec> = self.ancestors().collect();
        segments.reverse();
        for (index, segment) in segments.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            if segment.location.is_empty() {
                write!(f, "{}", segment.type_indicator)?;
            } else {
                write!(f, "{}{{{}}}", segment.type_indicator, segment.location)?;
            }
        }
        Ok(())
    }
}
