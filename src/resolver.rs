//! Resolver helpers, the helper registry and resolution contexts.
//!
//! A [`ResolverHelper`] knows how to build a file object and a file system for
//! one type indicator. Helpers are looked up in a [`ResolverRegistry`] by the
//! type indicator of the segment being resolved, and are always driven through a
//! [`ResolutionContext`], which resolves the parent segment first (through its
//! cache) and hands the result to the helper in a [`ResolveRequest`].
//!
//! Each helper module exposes a `register(&ResolverRegistry)` function;
//! [`ResolverRegistry::with_defaults`] calls the built-in ones. Container
//! helpers need a directory parser and are registered by the caller.

mod compressed_stream;
mod container;
mod context;
mod data_range;
mod fake;
mod handle;
mod os;

pub use compressed_stream::CompressedStreamResolverHelper;
pub use container::ContainerResolverHelper;
pub use context::ResolutionContext;
pub use data_range::DataRangeResolverHelper;
pub use fake::FakeResolverHelper;
pub use handle::{FileObjectHandle, FileSystemHandle, Handle};
pub use os::OsResolverHelper;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::compression::CompressionRegistry;
use crate::config::ResolverConfig;
use crate::error::{Result, VfsError};
use crate::file_object::FileObject;
use crate::file_system::{FileSystem, StreamFileSystem};
use crate::path_spec::{PathSpec, TypeIndicator};

/// Factory for the file objects and file systems of one type indicator.
///
/// Factories may perform I/O (opening handles, parsing a container directory).
/// That is the cost the resolution context cache exists to avoid repeating, so a
/// helper should resolve anything else it needs through
/// [`ResolveRequest::context`] instead of opening it directly.
pub trait ResolverHelper: Send + Sync {
    /// The type indicator this helper serves
    fn type_indicator(&self) -> TypeIndicator;

    /// Build the byte-stream view of `request.spec()`
    fn new_file_object(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileObject>>;

    /// Build the directory/metadata view of `request.spec()`
    fn new_file_system(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>>;
}

/// Everything a helper factory receives for one resolution.
pub struct ResolveRequest<'a> {
    spec: &'a PathSpec,
    context: &'a ResolutionContext,
    parent: Option<FileObjectHandle>,
}

impl<'a> ResolveRequest<'a> {
    pub(crate) fn new(
        spec: &'a PathSpec,
        context: &'a ResolutionContext,
        parent: Option<FileObjectHandle>,
    ) -> Self {
        Self {
            spec,
            context,
            parent,
        }
    }

    /// The segment being resolved
    pub fn spec(&self) -> &'a PathSpec {
        self.spec
    }

    /// The context driving this resolution
    pub fn context(&self) -> &'a ResolutionContext {
        self.context
    }

    pub fn config(&self) -> &'a ResolverConfig {
        self.context.config()
    }

    /// The already resolved parent stream.
    ///
    /// The returned object holds its own reference on the parent cache entry, so
    /// the parent stays open for as long as the object built on top of it.
    ///
    /// # Errors
    /// * `InvalidSpecification` when the segment has no parent
    pub fn parent(&self) -> Result<Arc<dyn FileObject>> {
        match &self.parent {
            Some(handle) => Ok(Arc::new(handle.clone())),
            None => Err(VfsError::invalid_spec(format!(
                "{} requires a parent stream",
                self.spec.type_indicator()
            ))),
        }
    }

    /// The `path` location parameter
    ///
    /// # Errors
    /// * `InvalidSpecification` when the segment carries no path
    pub fn location_path(&self) -> Result<&'a str> {
        self.spec.location().path.as_deref().ok_or_else(|| {
            VfsError::invalid_spec(format!(
                "{} path specification has no path",
                self.spec.type_indicator()
            ))
        })
    }
}

/// File system for segments that are a single stream: the cached file object of
/// the same specification, exposed as the entry `/`.
pub(crate) fn stream_file_system(request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>> {
    let stream = request.context().resolve_file_object(request.spec())?;
    Ok(Arc::new(StreamFileSystem::new(
        request.spec().type_indicator().clone(),
        Arc::new(stream),
    )))
}

/// Mapping from type indicator to resolver helper.
///
/// Lookups take a shared lock; registration takes the exclusive one. The
/// registry also owns the [`CompressionRegistry`] used by stream helpers.
pub struct ResolverRegistry {
    helpers: RwLock<HashMap<TypeIndicator, Arc<dyn ResolverHelper>>>,
    compression: Arc<CompressionRegistry>,
}

impl ResolverRegistry {
    /// Registry with no helpers
    pub fn new(compression: Arc<CompressionRegistry>) -> Self {
        Self {
            helpers: RwLock::new(HashMap::new()),
            compression,
        }
    }

    /// Registry with the built-in `OS`, `DATA_RANGE`, `COMPRESSED_STREAM` and
    /// `GZIP` helpers and every built-in codec
    pub fn with_defaults() -> Self {
        let registry = Self::new(Arc::new(CompressionRegistry::with_defaults()));
        for register in [
            os::register,
            data_range::register,
            compressed_stream::register,
        ] {
            if let Err(e) = register(&registry) {
                log::warn!("built-in helper registration failed: {e}");
            }
        }
        registry
    }

    /// Process-wide default registry, built on first use
    pub fn global() -> Arc<ResolverRegistry> {
        static GLOBAL: OnceLock<Arc<ResolverRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(ResolverRegistry::with_defaults()))
            .clone()
    }

    /// Register `helper` under its type indicator
    ///
    /// # Errors
    /// * `DuplicateRegistration` when the type indicator is taken; the first helper stays active
    pub fn register_helper(&self, helper: Arc<dyn ResolverHelper>) -> Result<()> {
        let type_indicator = helper.type_indicator();
        let mut helpers = self.helpers.write();
        if helpers.contains_key(&type_indicator) {
            return Err(VfsError::DuplicateRegistration {
                kind: "resolver helper",
                tag: type_indicator.to_string(),
            });
        }
        log::debug!("registered resolver helper for {type_indicator}");
        helpers.insert(type_indicator, helper);
        Ok(())
    }

    /// Look up the helper for `type_indicator`
    ///
    /// # Errors
    /// * `UnsupportedType` when nothing is registered for it
    pub fn get_helper(&self, type_indicator: &TypeIndicator) -> Result<Arc<dyn ResolverHelper>> {
        self.helpers
            .read()
            .get(type_indicator)
            .cloned()
            .ok_or_else(|| VfsError::unsupported_type(type_indicator.as_str()))
    }

    pub fn is_registered(&self, type_indicator: &TypeIndicator) -> bool {
        self.helpers.read().contains_key(type_indicator)
    }

    /// Registered type indicators, sorted by tag
    pub fn type_indicators(&self) -> Vec<TypeIndicator> {
        let mut indicators: Vec<_> = self.helpers.read().keys().cloned().collect();
        indicators.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        indicators
    }

    pub fn compression(&self) -> &Arc<CompressionRegistry> {
        &self.compression
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("type_indicators", &self.type_indicators())
            .field("compression", &self.compression)
            .finish()
    }
}
