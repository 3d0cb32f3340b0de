//! `FAKE` segments: in-memory root sources.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ResolveRequest, ResolverHelper};
use crate::error::{Result, VfsError};
use crate::file_object::{FileObject, MemoryFileObject};
use crate::file_system::{DirectoryEntry, FileSystem, MemoryFileSystem};
use crate::path_spec::TypeIndicator;

/// Serves `FAKE` specifications from buffers added with [`add_file`](Self::add_file).
///
/// Not part of the default registry; register an instance and keep a clone of
/// the `Arc` to add files later.
#[derive(Debug, Default)]
pub struct FakeResolverHelper {
    files: RwLock<BTreeMap<String, Arc<[u8]>>>,
}

impl FakeResolverHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `path`, replacing any previous content
    pub fn add_file(&self, path: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.files.write().insert(path.into(), data.into());
    }

    pub fn remove_file(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }
}

impl ResolverHelper for FakeResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Fake
    }

    fn new_file_object(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileObject>> {
        let path = request.location_path()?;
        let data = self
            .files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::FileNotFound { path: path.into() })?;
        Ok(Arc::new(MemoryFileObject::new(data)))
    }

    fn new_file_system(&self, _request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>> {
        let entries: Vec<DirectoryEntry> = self
            .files
            .read()
            .iter()
            .map(|(path, data)| DirectoryEntry::stored(path.clone(), 0, data.len() as u64))
            .collect();
        Ok(Arc::new(MemoryFileSystem::new(TypeIndicator::Fake, entries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_spec::PathSpec;
    use crate::resolver::{ResolutionContext, ResolverRegistry};

    #[test]
    fn test_fake_files() {
        let registry = ResolverRegistry::with_defaults();
        let fake = Arc::new(FakeResolverHelper::new());
        fake.add_file("/a", b"alpha".to_vec());
        fake.add_file("/b", b"be".to_vec());
        registry.register_helper(fake.clone()).unwrap();
        let context = ResolutionContext::with_registry(Arc::new(registry));

        let a = context.resolve_file_object(&PathSpec::fake("/a").unwrap()).unwrap();
        assert_eq!(a.read_at(0, 10).unwrap(), b"alpha");

        let fs = context.resolve_file_system(&PathSpec::fake("/a").unwrap()).unwrap();
        assert_eq!(fs.entries().unwrap().len(), 2);
        assert!(fs.file_entry_exists("/b").unwrap());

        assert!(matches!(
            context.resolve_file_object(&PathSpec::fake("/missing").unwrap()),
            Err(VfsError::FileNotFound { .. })
        ));
    }
}
