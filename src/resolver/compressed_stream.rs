//! `COMPRESSED_STREAM` and `GZIP` segments.
//!
//! Both decode the parent through the registry's
//! [`CompressionRegistry`](crate::compression::CompressionRegistry).
//! `COMPRESSED_STREAM` takes the method from its location; `GZIP` always uses
//! gzip member framing.

use std::sync::Arc;

use super::{stream_file_system, ResolveRequest, ResolverHelper, ResolverRegistry};
use crate::compression::CompressionMethod;
use crate::error::{Result, VfsError};
use crate::file_object::{CompressedStreamFileObject, FileObject};
use crate::file_system::FileSystem;
use crate::path_spec::TypeIndicator;

#[derive(Debug, Clone)]
pub struct CompressedStreamResolverHelper {
    type_indicator: TypeIndicator,
    /// Method used regardless of location, for single-codec type indicators
    fixed_method: Option<CompressionMethod>,
}

impl CompressedStreamResolverHelper {
    /// Helper for `COMPRESSED_STREAM`, codec chosen per specification
    pub fn compressed_stream() -> Self {
        Self {
            type_indicator: TypeIndicator::CompressedStream,
            fixed_method: None,
        }
    }

    /// Helper for `GZIP`
    pub fn gzip() -> Self {
        Self::with_fixed_method(TypeIndicator::Gzip, CompressionMethod::Gzip)
    }

    /// Helper decoding every specification of `type_indicator` with `method`
    pub fn with_fixed_method(type_indicator: TypeIndicator, method: CompressionMethod) -> Self {
        Self {
            type_indicator,
            fixed_method: Some(method),
        }
    }

    fn method(&self, request: &ResolveRequest<'_>) -> Result<CompressionMethod> {
        if let Some(method) = &self.fixed_method {
            return Ok(method.clone());
        }
        request
            .spec()
            .location()
            .compression_method
            .clone()
            .ok_or_else(|| {
                VfsError::invalid_spec(format!(
                    "{} requires compression_method",
                    self.type_indicator
                ))
            })
    }
}

impl ResolverHelper for CompressedStreamResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator.clone()
    }

    fn new_file_object(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileObject>> {
        let method = self.method(request)?;
        let compression = Arc::clone(request.context().registry().compression());
        let object = CompressedStreamFileObject::new(
            request.parent()?,
            method,
            compression,
            request.config().read_chunk_size,
        )?;
        Ok(Arc::new(object))
    }

    fn new_file_system(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>> {
        stream_file_system(request)
    }
}

pub fn register(registry: &ResolverRegistry) -> Result<()> {
    registry.register_helper(Arc::new(CompressedStreamResolverHelper::compressed_stream()))?;
    registry.register_helper(Arc::new(CompressedStreamResolverHelper::gzip()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_spec::PathSpec;
    use crate::resolver::{FakeResolverHelper, ResolutionContext};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn context(files: &[(&str, Vec<u8>)]) -> ResolutionContext {
        let registry = ResolverRegistry::with_defaults();
        let fake = FakeResolverHelper::new();
        for (path, data) in files {
            fake.add_file(*path, data.clone());
        }
        registry.register_helper(Arc::new(fake)).unwrap();
        ResolutionContext::with_registry(Arc::new(registry))
    }

    #[test]
    fn test_gzip_and_compressed_stream_agree() {
        let context = context(&[("/log.gz", gzip(b"2024-01-01 boot\n"))]);
        let root = PathSpec::fake("/log.gz").unwrap();

        let by_type = context
            .resolve_file_object(&PathSpec::gzip(root.clone()).unwrap())
            .unwrap();
        let by_method = context
            .resolve_file_object(&PathSpec::compressed_stream(root.clone(), CompressionMethod::Gzip).unwrap())
            .unwrap();

        assert_eq!(by_type.read_at(0, 64).unwrap(), b"2024-01-01 boot\n");
        assert_eq!(by_method.size().unwrap(), 16);
        // One cached root shared by both streams
        assert_eq!(context.reference_count(&root), 2);
    }

    #[test]
    fn test_stream_file_system() {
        let context = context(&[("/log.gz", gzip(b"abc"))]);
        let spec = PathSpec::gzip(PathSpec::fake("/log.gz").unwrap()).unwrap();

        let fs = context.resolve_file_system(&spec).unwrap();
        assert_eq!(fs.entry("/").unwrap().unwrap().size, 3);
        assert_eq!(context.reference_count(&spec), 1);
    }

    #[test]
    fn test_corrupt_stream_fails_resolution() {
        // Valid header, then a deflate block with the reserved block type
        let bad = b"\x1f\x8b\x08\x00\x00\x00\x00\x00\x00\xff\x07\x00\x00\x00".to_vec();
        let context = context(&[("/bad.gz", bad)]);
        let spec = PathSpec::gzip(PathSpec::fake("/bad.gz").unwrap()).unwrap();

        assert!(matches!(
            context.resolve_file_object(&spec),
            Err(VfsError::CodecError { .. })
        ));
        assert_eq!(context.cached_count(), 0);
    }

    #[test]
    fn test_unregistered_method_fails_resolution() {
        let context = context(&[("/data.lz4", b"\x04\x22\x4d\x18payload".to_vec())]);
        let spec = PathSpec::compressed_stream(
            PathSpec::fake("/data.lz4").unwrap(),
            CompressionMethod::custom("LZ4"),
        )
        .unwrap();

        match context.resolve_file_object(&spec) {
            Err(VfsError::UnsupportedType { tag, .. }) => assert_eq!(tag, "lz4"),
            other => panic!("expected UnsupportedType, got {other:?}"),
        }
        assert_eq!(context.cached_count(), 0);
    }

    #[test]
    fn test_empty_parent_is_empty_stream() {
        let context = context(&[("/empty", Vec::new())]);
        let spec = PathSpec::compressed_stream(PathSpec::fake("/empty").unwrap(), CompressionMethod::Xz)
            .unwrap();

        let object = context.resolve_file_object(&spec).unwrap();
        assert_eq!(object.size().unwrap(), 0);
    }
}
