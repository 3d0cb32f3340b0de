//! Resolver limits and tuning knobs.
//!
//! Defaults are usable as-is. With the `config` feature enabled, values can be
//! loaded from a TOML file (`$CONFIG_DIR/vpath/config.toml` unless a path is
//! given); missing keys fall back to the defaults.

use crate::error::{Result, VfsError};
use serde::{Deserialize, Serialize};

/// Limits applied by a [`ResolutionContext`](crate::resolver::ResolutionContext)
/// and tuning used by the built-in file objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of segments in a path specification chain
    pub max_depth: usize,

    /// Maximum number of file objects and file systems cached per context
    pub max_open_objects: usize,

    /// Compressed bytes fed to a decompressor per call
    pub read_chunk_size: usize,

    /// OS files smaller than this are read into memory, larger ones are memory-mapped
    pub memory_map_threshold: u64,
}

impl ResolverConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 32;
    pub const DEFAULT_MAX_OPEN_OBJECTS: usize = 1024;
    pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024; // 64KB
    pub const DEFAULT_MEMORY_MAP_THRESHOLD: u64 = 50 * 1024 * 1024; // 50MB

    /// Check that every limit is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(VfsError::config("max_depth must be at least 1"));
        }
        if self.max_open_objects == 0 {
            return Err(VfsError::config("max_open_objects must be at least 1"));
        }
        if self.read_chunk_size == 0 {
            return Err(VfsError::config("read_chunk_size must be at least 1"));
        }
        Ok(())
    }

    /// Parse a configuration from TOML text
    #[cfg(feature = "config")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| VfsError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or from the user config directory when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    #[cfg(feature = "config")]
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match dirs::config_dir() {
                Some(dir) => (dir.join("vpath").join("config.toml"), false),
                None => return Ok(Self::default()),
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                log::debug!("no config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(VfsError::file_error(
                format!("Failed to read config file: {}", path.display()),
                e,
            )),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_open_objects: Self::DEFAULT_MAX_OPEN_OBJECTS,
            read_chunk_size: Self::DEFAULT_READ_CHUNK_SIZE,
            memory_map_threshold: Self::DEFAULT_MEMORY_MAP_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory_map_threshold, 50 * 1024 * 1024);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = ResolverConfig {
            max_depth: 0,
            ..ResolverConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VfsError::ConfigError { .. })
        ));

        let config = ResolverConfig {
            read_chunk_size: 0,
            ..ResolverConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ResolverConfig::from_toml_str("max_depth = 4\n").unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(
            config.max_open_objects,
            ResolverConfig::DEFAULT_MAX_OPEN_OBJECTS
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = ResolverConfig::load(Some(std::path::Path::new("/no/such/vpath.toml")));
        assert!(matches!(result, Err(VfsError::FileError { .. })));
    }
}
