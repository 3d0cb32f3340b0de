//! Type indicators naming the resolver helper a path segment needs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VfsError;

/// Tag identifying which resolver helper a [`PathSpec`](super::PathSpec) segment requires.
///
/// Built-in types are statically known variants; third-party types use
/// [`TypeIndicator::Custom`]. Tags are upper-case strings on the wire, and
/// parsing a built-in tag always yields the built-in variant, so a custom
/// tag can never shadow one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeIndicator {
    /// File on the host operating system
    Os,
    /// In-memory byte source registered with a fake helper
    Fake,
    /// Byte window over the parent stream
    DataRange,
    /// Parent stream decoded with a named compression method
    CompressedStream,
    /// GZIP members over the parent stream
    Gzip,
    /// ZIP archive member
    Zip,
    /// TAR archive member
    Tar,
    /// Runtime-registered third-party type
    Custom(String),
}

impl TypeIndicator {
    pub const OS: &'static str = "OS";
    pub const FAKE: &'static str = "FAKE";
    pub const DATA_RANGE: &'static str = "DATA_RANGE";
    pub const COMPRESSED_STREAM: &'static str = "COMPRESSED_STREAM";
    pub const GZIP: &'static str = "GZIP";
    pub const ZIP: &'static str = "ZIP";
    pub const TAR: &'static str = "TAR";

    /// Build a type indicator from a tag, mapping built-in tags to their variants
    pub fn custom(tag: impl Into<String>) -> Self {
        let tag = tag.into().to_ascii_uppercase();
        match tag.as_str() {
            Self::OS => Self::Os,
            Self::FAKE => Self::Fake,
            Self::DATA_RANGE => Self::DataRange,
            Self::COMPRESSED_STREAM => Self::CompressedStream,
            Self::GZIP => Self::Gzip,
            Self::ZIP => Self::Zip,
            Self::TAR => Self::Tar,
            _ => Self::Custom(tag),
        }
    }

    /// String tag for this type indicator
    pub fn as_str(&self) -> &str {
        match self {
            Self::Os => Self::OS,
            Self::Fake => Self::FAKE,
            Self::DataRange => Self::DATA_RANGE,
            Self::CompressedStream => Self::COMPRESSED_STREAM,
            Self::Gzip => Self::GZIP,
            Self::Zip => Self::ZIP,
            Self::Tar => Self::TAR,
            Self::Custom(tag) => tag,
        }
    }

    /// Whether a specification of this type may appear without a parent
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Os | Self::Fake)
    }

    /// Whether this type indicator names an archive-like container with inner paths
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Zip | Self::Tar)
    }

    /// Re-map a `Custom` variant carrying a built-in tag onto the built-in variant
    pub(crate) fn canonical(self) -> Self {
        match self {
            Self::Custom(tag) => Self::custom(tag),
            other => other,
        }
    }
}

impl fmt::Display for TypeIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeIndicator {
    type Err = VfsError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(VfsError::invalid_spec("empty type indicator"));
        }
        if !tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(VfsError::invalid_spec(format!(
                "type indicator contains invalid characters: {tag:?}"
            )));
        }
        Ok(Self::custom(tag))
    }
}

impl TryFrom<String> for TypeIndicator {
    type Error = VfsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeIndicator> for String {
    fn from(value: TypeIndicator) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tags_round_trip() {
        for indicator in [
            TypeIndicator::Os,
            TypeIndicator::Fake,
            TypeIndicator::DataRange,
            TypeIndicator::CompressedStream,
            TypeIndicator::Gzip,
            TypeIndicator::Zip,
            TypeIndicator::Tar,
        ] {
            let parsed: TypeIndicator = indicator.as_str().parse().unwrap();
            assert_eq!(parsed, indicator);
        }
    }

    #[test]
    fn test_custom_cannot_shadow_builtin() {
        assert_eq!(TypeIndicator::custom("zip"), TypeIndicator::Zip);
        assert_eq!(
            TypeIndicator::Custom("TAR".into()).canonical(),
            TypeIndicator::Tar
        );
        assert_eq!(
            TypeIndicator::custom("qcow"),
            TypeIndicator::Custom("QCOW".into())
        );
    }

    #[test]
    fn test_invalid_tags_rejected() {
        assert!("".parse::<TypeIndicator>().is_err());
        assert!("NOT A TAG".parse::<TypeIndicator>().is_err());
        assert!("a/b".parse::<TypeIndicator>().is_err());
    }

    #[test]
    fn test_root_types() {
        assert!(TypeIndicator::Os.is_root());
        assert!(TypeIndicator::Fake.is_root());
        assert!(!TypeIndicator::Zip.is_root());
        assert!(!TypeIndicator::custom("VHD").is_root());
    }
}
