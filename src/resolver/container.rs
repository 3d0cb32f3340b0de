//! Container segments (`ZIP`, `TAR`, or any custom archive type).
//!
//! The container's directory is parsed once per container root and cached as a
//! file system; every member specification of the same container resolves that
//! one cached file system and slices its bytes out of the parent stream.

use std::fmt;
use std::sync::Arc;

use super::{FileSystemHandle, ResolveRequest, ResolverHelper};
use crate::error::{Result, VfsError};
use crate::file_object::{CompressedStreamFileObject, DataRangeFileObject, FileObject};
use crate::file_system::{ContainerFileSystem, DirectoryParser, FileSystem};
use crate::path_spec::TypeIndicator;

/// Resolver helper for one container format, parameterized by its parser.
pub struct ContainerResolverHelper {
    type_indicator: TypeIndicator,
    parser: Arc<dyn DirectoryParser>,
}

impl ContainerResolverHelper {
    pub fn new(type_indicator: TypeIndicator, parser: impl DirectoryParser + 'static) -> Self {
        Self {
            type_indicator,
            parser: Arc::new(parser),
        }
    }

    /// Helper for `ZIP` archives
    pub fn zip(parser: impl DirectoryParser + 'static) -> Self {
        Self::new(TypeIndicator::Zip, parser)
    }

    /// Helper for `TAR` archives
    pub fn tar(parser: impl DirectoryParser + 'static) -> Self {
        Self::new(TypeIndicator::Tar, parser)
    }
}

impl fmt::Debug for ContainerResolverHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerResolverHelper")
            .field("type_indicator", &self.type_indicator)
            .finish_non_exhaustive()
    }
}

/// Member stream; keeps the container's file system cached while it lives.
struct ContainerMember {
    stream: Arc<dyn FileObject>,
    _file_system: FileSystemHandle,
}

impl FileObject for ContainerMember {
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        self.stream.read_at(offset, size)
    }

    fn size(&self) -> Result<u64> {
        self.stream.size()
    }

    fn close(&self) {
        self.stream.close();
    }
}

impl ResolverHelper for ContainerResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator.clone()
    }

    fn new_file_object(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileObject>> {
        let inner_path = request.location_path()?;
        let file_system = request
            .context()
            .resolve_file_system(&request.spec().container_root())?;
        let entry = file_system
            .entry(inner_path)?
            .ok_or_else(|| VfsError::FileNotFound {
                path: inner_path.into(),
            })?;

        let stored: Arc<dyn FileObject> = Arc::new(DataRangeFileObject::new(
            request.parent()?,
            entry.offset,
            entry.size,
        )?);
        let stream: Arc<dyn FileObject> = match entry.compression_method {
            Some(method) => Arc::new(CompressedStreamFileObject::new(
                stored,
                method,
                Arc::clone(request.context().registry().compression()),
                request.config().read_chunk_size,
            )?),
            None => stored,
        };

        Ok(Arc::new(ContainerMember {
            stream,
            _file_system: file_system,
        }))
    }

    fn new_file_system(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>> {
        let root = request.spec().container_root();
        if &root != request.spec() {
            // Member specifications share the file system of their container root
            let file_system = request.context().resolve_file_system(&root)?;
            return Ok(Arc::new(file_system));
        }

        let file_system = ContainerFileSystem::open(
            self.type_indicator.clone(),
            request.parent()?,
            self.parser.as_ref(),
        )?;
        Ok(Arc::new(file_system))
    }
}
