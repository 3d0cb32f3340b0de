//! Session-scoped cache of resolved objects.
//!
//! Every entry is keyed by the structural value of its path specification and
//! the kind of object (file object or file system) built for it. Entries carry a
//! reference count equal to the number of live [`Handle`]s; the entry is closed
//! and evicted when the count reaches zero, or unconditionally when the context
//! is closed.
//!
//! Locking: one mutex guards the whole cache. It is never held while a helper
//! factory runs, nor while an object is closed or dropped, since both can call
//! back into the context (a child releasing its parent, a container member
//! resolving its file system).

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use super::handle::{FileObjectHandle, FileSystemHandle, Handle};
use super::{ResolveRequest, ResolverHelper, ResolverRegistry};
use crate::config::ResolverConfig;
use crate::error::{Result, VfsError};
use crate::file_object::FileObject;
use crate::file_system::FileSystem;
use crate::path_spec::PathSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ResourceKind {
    FileObject,
    FileSystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) kind: ResourceKind,
    pub(crate) spec: PathSpec,
}

enum CachedObject {
    FileObject(Arc<dyn FileObject>),
    FileSystem(Arc<dyn FileSystem>),
}

impl CachedObject {
    fn close(&self) {
        match self {
            CachedObject::FileObject(object) => object.close(),
            CachedObject::FileSystem(file_system) => file_system.close(),
        }
    }
}

/// Conversion between the typed objects handed out and the cache's storage.
trait Resource: Send + Sync {
    const KIND: ResourceKind;

    fn wrap(object: Arc<Self>) -> CachedObject;

    fn unwrap(cached: &CachedObject) -> Option<Arc<Self>>;

    fn build(helper: &dyn ResolverHelper, request: &ResolveRequest<'_>) -> Result<Arc<Self>>;
}

impl Resource for dyn FileObject {
    const KIND: ResourceKind = ResourceKind::FileObject;

    fn wrap(object: Arc<Self>) -> CachedObject {
        CachedObject::FileObject(object)
    }

    fn unwrap(cached: &CachedObject) -> Option<Arc<Self>> {
        match cached {
            CachedObject::FileObject(object) => Some(Arc::clone(object)),
            CachedObject::FileSystem(_) => None,
        }
    }

    fn build(helper: &dyn ResolverHelper, request: &ResolveRequest<'_>) -> Result<Arc<Self>> {
        helper.new_file_object(request)
    }
}

impl Resource for dyn FileSystem {
    const KIND: ResourceKind = ResourceKind::FileSystem;

    fn wrap(object: Arc<Self>) -> CachedObject {
        CachedObject::FileSystem(object)
    }

    fn unwrap(cached: &CachedObject) -> Option<Arc<Self>> {
        match cached {
            CachedObject::FileSystem(file_system) => Some(Arc::clone(file_system)),
            CachedObject::FileObject(_) => None,
        }
    }

    fn build(helper: &dyn ResolverHelper, request: &ResolveRequest<'_>) -> Result<Arc<Self>> {
        helper.new_file_system(request)
    }
}

struct CacheEntry {
    object: CachedObject,
    references: usize,
}

impl CacheEntry {
    /// Take one more reference if the entry holds a `T`
    fn acquire<T: Resource + ?Sized>(&mut self) -> Option<Arc<T>> {
        let object = T::unwrap(&self.object)?;
        self.references += 1;
        Some(object)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Keys being built, per thread
    resolving: HashSet<(ThreadId, CacheKey)>,
    closed: bool,
}

/// State shared by every clone of a context and weakly by its handles
pub(crate) struct ContextShared {
    registry: Arc<ResolverRegistry>,
    config: ResolverConfig,
    state: Mutex<CacheState>,
}

impl ContextShared {
    pub(crate) fn acquire(&self, key: &CacheKey) {
        if let Some(entry) = self.state.lock().entries.get_mut(key) {
            entry.references += 1;
        }
    }

    pub(crate) fn release(&self, key: &CacheKey) {
        let evicted = {
            let mut state = self.state.lock();
            let remaining = match state.entries.get_mut(key) {
                Some(entry) => {
                    entry.references = entry.references.saturating_sub(1);
                    entry.references
                }
                None => return,
            };
            if remaining > 0 {
                return;
            }
            state.entries.remove(key)
        };

        if let Some(entry) = evicted {
            log::debug!("evicting {:?} {}", key.kind, key.spec);
            entry.object.close();
        }
    }

    /// Close and drop every entry, children before parents
    fn close_all(&self) -> usize {
        let mut entries: Vec<(CacheKey, CacheEntry)> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.entries.drain().collect()
        };
        let count = entries.len();
        entries.sort_by_key(|(key, _)| std::cmp::Reverse(key.spec.depth()));
        for (_, entry) in &entries {
            entry.object.close();
        }
        drop(entries);
        count
    }
}

impl Drop for ContextShared {
    fn drop(&mut self) {
        let count = self.close_all();
        if count > 0 {
            log::warn!("resolution context dropped with {count} objects still referenced");
        }
    }
}

/// Removes a key from the resolving set when its build finishes, however it ends
struct ResolvingGuard<'a> {
    shared: &'a ContextShared,
    entry: (ThreadId, CacheKey),
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        self.shared.state.lock().resolving.remove(&self.entry);
    }
}

/// Cache of resolved file objects and file systems for one unit of work.
///
/// Cloning is cheap and yields another handle on the same cache; the cache is
/// closed when [`close`](Self::close) is called or the last clone is dropped.
/// Resolution may run on several threads at once. If two threads build the same
/// specification concurrently, the first insert wins and the other build is closed.
#[derive(Clone)]
pub struct ResolutionContext {
    shared: Arc<ContextShared>,
}

impl ResolutionContext {
    /// Context over `registry` with the given limits
    ///
    /// # Errors
    /// * `ConfigError` when a limit is unusable
    pub fn new(registry: Arc<ResolverRegistry>, config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(ContextShared {
                registry,
                config,
                state: Mutex::new(CacheState::default()),
            }),
        })
    }

    /// Context over `registry` with default limits
    pub fn with_registry(registry: Arc<ResolverRegistry>) -> Self {
        Self {
            shared: Arc::new(ContextShared {
                registry,
                config: ResolverConfig::default(),
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.shared.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.shared.config
    }

    /// Resolve `spec` to a file object, reusing the cached one if present
    ///
    /// # Errors
    /// * `UnsupportedType` when no helper serves a segment of the chain
    /// * `CircularSpecification` when resolving `spec` re-enters itself
    /// * `ResourceExhausted` when the chain is deeper than `max_depth` or the
    ///   cache already holds `max_open_objects` objects
    /// * `Closed` when the context has been closed
    /// * Any error raised by a helper factory
    pub fn resolve_file_object(&self, spec: &PathSpec) -> Result<FileObjectHandle> {
        self.resolve::<dyn FileObject>(spec)
    }

    /// Resolve `spec` to a file system, reusing the cached one if present
    ///
    /// # Errors
    /// Same as [`resolve_file_object`](Self::resolve_file_object)
    pub fn resolve_file_system(&self, spec: &PathSpec) -> Result<FileSystemHandle> {
        self.resolve::<dyn FileSystem>(spec)
    }

    fn resolve<T: Resource + ?Sized>(&self, spec: &PathSpec) -> Result<Handle<T>> {
        let key = CacheKey {
            kind: T::KIND,
            spec: spec.clone(),
        };
        let thread = thread::current().id();

        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(VfsError::closed("resolution context"));
            }
            if let Some(object) = state.entries.get_mut(&key).and_then(CacheEntry::acquire::<T>) {
                log::trace!("cache hit for {:?} {}", key.kind, spec);
                return Ok(self.handle(key, object));
            }

            let depth = spec.depth();
            if depth > self.shared.config.max_depth {
                return Err(VfsError::exhausted(format!(
                    "path specification depth {depth} exceeds max_depth {}",
                    self.shared.config.max_depth
                )));
            }
            if !state.resolving.insert((thread, key.clone())) {
                return Err(VfsError::CircularSpecification {
                    spec: spec.to_string(),
                });
            }
        }
        let _resolving = ResolvingGuard {
            shared: &self.shared,
            entry: (thread, key.clone()),
        };

        log::debug!("cache miss for {:?} {}", key.kind, spec);
        let helper = self.shared.registry.get_helper(spec.type_indicator())?;
        let parent = match spec.parent() {
            Some(parent) => Some(self.resolve_file_object(parent)?),
            None => None,
        };
        let object = {
            let request = ResolveRequest::new(spec, self, parent);
            T::build(helper.as_ref(), &request)?
        };

        self.insert(key, object)
    }

    /// Cache a freshly built object, or hand back the one another thread cached first
    fn insert<T: Resource + ?Sized>(&self, key: CacheKey, object: Arc<T>) -> Result<Handle<T>> {
        let outcome = {
            let mut state = self.shared.state.lock();
            if state.closed {
                Err(VfsError::closed("resolution context"))
            } else if let Some(existing) =
                state.entries.get_mut(&key).and_then(CacheEntry::acquire::<T>)
            {
                Ok(Some(existing))
            } else if state.entries.len() >= self.shared.config.max_open_objects {
                Err(VfsError::exhausted(format!(
                    "context already holds max_open_objects ({}) objects",
                    self.shared.config.max_open_objects
                )))
            } else {
                state.entries.insert(
                    key.clone(),
                    CacheEntry {
                        object: T::wrap(Arc::clone(&object)),
                        references: 1,
                    },
                );
                Ok(None)
            }
        };

        match outcome {
            Ok(None) => Ok(self.handle(key, object)),
            Ok(Some(existing)) => {
                log::debug!("discarding duplicate build of {}", key.spec);
                T::wrap(object).close();
                Ok(self.handle(key, existing))
            }
            Err(e) => {
                T::wrap(object).close();
                Err(e)
            }
        }
    }

    fn handle<T: ?Sized>(&self, key: CacheKey, object: Arc<T>) -> Handle<T> {
        Handle::new(key, object, Arc::downgrade(&self.shared))
    }

    fn count(&self, kind: ResourceKind, spec: &PathSpec) -> usize {
        let key = CacheKey {
            kind,
            spec: spec.clone(),
        };
        self.shared
            .state
            .lock()
            .entries
            .get(&key)
            .map_or(0, |entry| entry.references)
    }

    /// Live references to the cached file object for `spec`; 0 when not cached
    pub fn reference_count(&self, spec: &PathSpec) -> usize {
        self.count(ResourceKind::FileObject, spec)
    }

    /// Live references to the cached file system for `spec`; 0 when not cached
    pub fn file_system_reference_count(&self, spec: &PathSpec) -> usize {
        self.count(ResourceKind::FileSystem, spec)
    }

    /// Whether a file object for `spec` is cached
    pub fn is_cached(&self, spec: &PathSpec) -> bool {
        self.reference_count(spec) > 0
    }

    /// Number of cached file objects and file systems
    pub fn cached_count(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Close every cached object regardless of its reference count.
    ///
    /// Outstanding handles keep dereferencing to their (now closed) objects;
    /// further resolution on this context fails with `Closed`.
    pub fn close(&self) {
        let count = self.shared.close_all();
        log::debug!("resolution context closed, {count} cached objects force-closed");
    }
}

impl fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("cached", &self.cached_count())
            .field("config", &self.shared.config)
            .finish()
    }
}
