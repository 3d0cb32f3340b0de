//! `DATA_RANGE` segments.

use std::sync::Arc;

use super::{stream_file_system, ResolveRequest, ResolverHelper, ResolverRegistry};
use crate::error::{Result, VfsError};
use crate::file_object::{DataRangeFileObject, FileObject};
use crate::file_system::FileSystem;
use crate::path_spec::TypeIndicator;

#[derive(Debug, Default, Clone, Copy)]
pub struct DataRangeResolverHelper;

impl ResolverHelper for DataRangeResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::DataRange
    }

    fn new_file_object(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileObject>> {
        let location = request.spec().location();
        let (offset, size) = location
            .range_offset
            .zip(location.range_size)
            .ok_or_else(|| VfsError::invalid_spec("DATA_RANGE requires range_offset and range_size"))?;
        Ok(Arc::new(DataRangeFileObject::new(request.parent()?, offset, size)?))
    }

    fn new_file_system(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>> {
        stream_file_system(request)
    }
}

pub fn register(registry: &ResolverRegistry) -> Result<()> {
    registry.register_helper(Arc::new(DataRangeResolverHelper))
}
