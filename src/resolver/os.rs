//! `OS` segments: files on the host.

use std::sync::Arc;

use super::{ResolveRequest, ResolverHelper, ResolverRegistry};
use crate::error::Result;
use crate::file_object::{FileObject, OsFileObject};
use crate::file_system::{FileSystem, OsFileSystem};
use crate::path_spec::TypeIndicator;

#[derive(Debug, Default, Clone, Copy)]
pub struct OsResolverHelper;

impl ResolverHelper for OsResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Os
    }

    fn new_file_object(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileObject>> {
        let path = request.location_path()?;
        let object = OsFileObject::open(path, request.config().memory_map_threshold)?;
        Ok(Arc::new(object))
    }

    fn new_file_system(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>> {
        Ok(Arc::new(OsFileSystem::new(request.location_path()?)))
    }
}

pub fn register(registry: &ResolverRegistry) -> Result<()> {
    registry.register_helper(Arc::new(OsResolverHelper))
}
