//! Scoped references to cached objects.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use super::context::{CacheKey, ContextShared};
use crate::error::Result;
use crate::file_object::FileObject;
use crate::file_system::{DirectoryEntry, FileSystem};
use crate::path_spec::{PathSpec, TypeIndicator};

/// One counted reference to an object cached by a
/// [`ResolutionContext`](super::ResolutionContext).
///
/// Cloning takes another reference; dropping releases one. When the last
/// reference goes away the object is closed and evicted. A handle outliving its
/// context still dereferences to the object, which is closed by then.
pub struct Handle<T: ?Sized> {
    key: CacheKey,
    object: Arc<T>,
    context: Weak<ContextShared>,
}

/// Handle to a cached file object
pub type FileObjectHandle = Handle<dyn FileObject>;

/// Handle to a cached file system
pub type FileSystemHandle = Handle<dyn FileSystem>;

impl<T: ?Sized> Handle<T> {
    pub(crate) fn new(key: CacheKey, object: Arc<T>, context: Weak<ContextShared>) -> Self {
        Self {
            key,
            object,
            context,
        }
    }

    /// Specification this handle was resolved from
    pub fn spec(&self) -> &PathSpec {
        &self.key.spec
    }

    /// Give up this reference now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }

    /// Whether two handles refer to the same underlying object
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.object, &b.object)
    }
}

impl<T: ?Sized> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.object
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        if let Some(context) = self.context.upgrade() {
            context.acquire(&self.key);
        }
        Self {
            key: self.key.clone(),
            object: Arc::clone(&self.object),
            context: self.context.clone(),
        }
    }
}

impl<T: ?Sized> Drop for Handle<T> {
    fn drop(&mut self) {
        if let Some(context) = self.context.upgrade() {
            context.release(&self.key);
        }
    }
}

impl<T: ?Sized> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &self.key.kind)
            .field("spec", &self.key.spec.to_string())
            .finish()
    }
}

// Closing stays with the context: a handle only gives up its reference.
impl FileObject for FileObjectHandle {
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        self.object.read_at(offset, size)
    }

    fn size(&self) -> Result<u64> {
        self.object.size()
    }
}

impl FileSystem for FileSystemHandle {
    fn type_indicator(&self) -> TypeIndicator {
        self.object.type_indicator()
    }

    fn entry(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        self.object.entry(path)
    }

    fn entries(&self) -> Result<Vec<DirectoryEntry>> {
        self.object.entries()
    }
}
