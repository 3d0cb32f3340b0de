//! Format-specific parameters carried by a path specification segment.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::compression::CompressionMethod;

/// Type-specific parameters of one path specification segment.
///
/// Only semantically relevant fields exist here; there is no room for labels or
/// other metadata that would make two equal locations compare unequal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    /// Host path for `OS`, key for `FAKE`, inner path for containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Start of a `DATA_RANGE` window in the parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_offset: Option<u64>,

    /// Length of a `DATA_RANGE` window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_size: Option<u64>,

    /// Codec for `COMPRESSED_STREAM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_method: Option<CompressionMethod>,

    /// Container password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Location {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_range(mut self, offset: u64, size: u64) -> Self {
        self.range_offset = Some(offset);
        self.range_size = Some(size);
        self
    }

    pub fn with_compression_method(mut self, method: CompressionMethod) -> Self {
        self.compression_method = Some(method);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Names of the parameters that are set, in declaration order
    pub(crate) fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::with_capacity(5);
        if self.path.is_some() {
            fields.push("path");
        }
        if self.range_offset.is_some() {
            fields.push("range_offset");
        }
        if self.range_size.is_some() {
            fields.push("range_size");
        }
        if self.compression_method.is_some() {
            fields.push("compression_method");
        }
        if self.password.is_some() {
            fields.push("password");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(path) = &self.path {
            parts.push(format!("path: {path}"));
        }
        if let (Some(offset), Some(size)) = (self.range_offset, self.range_size) {
            parts.push(format!("range: {offset}+{size}"));
        }
        if let Some(method) = &self.compression_method {
            parts.push(format!("compression: {method}"));
        }
        if self.password.is_some() {
            parts.push("password: ***".to_string());
        }
        write!(f, "{}", parts.join(", "))
    }
}
