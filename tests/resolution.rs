use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use vpath::file_system::DirectoryEntry;
use vpath::resolver::{ContainerResolverHelper, FakeResolverHelper};
use vpath::{
    CompressionMethod, FileObject, FileObjectHandle, FileSystem, Location, PathSpec, ResolutionContext,
    ResolveRequest, ResolverConfig, ResolverHelper, ResolverRegistry, Result, TypeIndicator,
    VfsError,
};

/// Counts how often objects are opened and closed
#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl Counters {
    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct RecordingObject {
    parent: Arc<dyn FileObject>,
    counters: Arc<Counters>,
}

impl FileObject for RecordingObject {
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        self.parent.read_at(offset, size)
    }

    fn size(&self) -> Result<u64> {
        self.parent.size()
    }

    fn close(&self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pass-through helper recording open/close calls
struct RecordingHelper {
    counters: Arc<Counters>,
}

impl RecordingHelper {
    const TAG: &'static str = "RECORDING";
}

impl ResolverHelper for RecordingHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::custom(Self::TAG)
    }

    fn new_file_object(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileObject>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingObject {
            parent: request.parent()?,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn new_file_system(&self, _request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>> {
        Err(VfsError::unsupported_type(Self::TAG))
    }
}

/// Helper whose factory resolves a chain that contains the spec being resolved
struct LoopingHelper;

impl ResolverHelper for LoopingHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::custom("LOOP")
    }

    fn new_file_object(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileObject>> {
        let child = PathSpec::data_range(request.spec().clone(), 0, 1)?;
        let handle = request.context().resolve_file_object(&child)?;
        Ok(Arc::new(handle))
    }

    fn new_file_system(&self, request: &ResolveRequest<'_>) -> Result<Arc<dyn FileSystem>> {
        let handle = request.context().resolve_file_system(request.spec())?;
        Ok(Arc::new(handle))
    }
}

fn root_bytes() -> Vec<u8> {
    (0..1000u32).map(|n| (n % 251) as u8).collect()
}

fn setup(config: ResolverConfig) -> (ResolutionContext, Arc<Counters>, Arc<AtomicUsize>) {
    let registry = ResolverRegistry::with_defaults();

    let fake = FakeResolverHelper::new();
    fake.add_file("/image.raw", root_bytes());
    registry.register_helper(Arc::new(fake)).expect("register fake");

    let counters = Arc::new(Counters::default());
    registry
        .register_helper(Arc::new(RecordingHelper {
            counters: Arc::clone(&counters),
        }))
        .expect("register recording");
    registry
        .register_helper(Arc::new(LoopingHelper))
        .expect("register loop");

    // a.txt is stored at 100..150, b.txt at 600..610
    let parse_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&parse_calls);
    let parser = move |source: &dyn FileObject| -> Result<Vec<DirectoryEntry>> {
        calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(source.size()?, 1000);
        Ok(vec![
            DirectoryEntry::stored("a.txt", 100, 50),
            DirectoryEntry::stored("b.txt", 600, 10),
        ])
    };
    registry
        .register_helper(Arc::new(ContainerResolverHelper::zip(parser)))
        .expect("register zip");

    let context = ResolutionContext::new(Arc::new(registry), config).expect("create context");
    (context, counters, parse_calls)
}

fn root() -> PathSpec {
    PathSpec::fake("/image.raw").unwrap()
}

fn recording(parent: PathSpec) -> PathSpec {
    PathSpec::new(
        TypeIndicator::custom(RecordingHelper::TAG),
        Location::new(),
        Some(parent),
    )
    .unwrap()
}

#[test]
fn repeated_resolution_shares_one_object() {
    let (context, counters, _) = setup(ResolverConfig::default());
    let spec = recording(root());

    let first = context.resolve_file_object(&spec).unwrap();
    let second = context.resolve_file_object(&spec).unwrap();
    assert_eq!(counters.opened(), 1);
    assert_eq!(context.reference_count(&spec), 2);
    assert_eq!(first.read_at(0, 3).unwrap(), second.read_at(0, 3).unwrap());

    drop(first);
    assert_eq!(context.reference_count(&spec), 1);
    assert_eq!(counters.closed(), 0);

    drop(second);
    assert_eq!(context.reference_count(&spec), 0);
    assert_eq!(counters.closed(), 1);

    // Evicted: the next resolution opens a fresh object
    let _third = context.resolve_file_object(&spec).unwrap();
    assert_eq!(counters.opened(), 2);
}

#[test]
fn duplicate_registration_keeps_first_helper() {
    let (context, counters, _) = setup(ResolverConfig::default());
    let imposter = Arc::new(Counters::default());

    let result = context.registry().register_helper(Arc::new(RecordingHelper {
        counters: Arc::clone(&imposter),
    }));
    assert!(matches!(result, Err(VfsError::DuplicateRegistration { .. })));

    let _object = context.resolve_file_object(&recording(root())).unwrap();
    assert_eq!(counters.opened(), 1);
    assert_eq!(imposter.opened(), 0);
}

#[test]
fn self_referencing_chain_is_circular() {
    let (context, _, _) = setup(ResolverConfig::default());
    let spec = PathSpec::new(TypeIndicator::custom("LOOP"), Location::new(), Some(root())).unwrap();

    match context.resolve_file_object(&spec) {
        Err(VfsError::CircularSpecification { spec: rendered }) => assert!(rendered.contains("LOOP")),
        other => panic!("expected CircularSpecification, got {other:?}"),
    }
    assert!(matches!(
        context.resolve_file_system(&spec),
        Err(VfsError::CircularSpecification { .. })
    ));

    // Nothing leaked, and unrelated resolution still works
    assert_eq!(context.cached_count(), 0);
    assert!(context.resolve_file_object(&recording(root())).is_ok());
}

#[test]
fn zip_member_reads_stored_bytes_and_parses_once() {
    let (context, _, parse_calls) = setup(ResolverConfig::default());
    let leaf = PathSpec::container_member(TypeIndicator::Zip, root(), "a.txt").unwrap();
    let expected = &root_bytes()[100..150];

    let member = context.resolve_file_object(&leaf).unwrap();
    assert_eq!(member.size().unwrap(), 50);
    assert_eq!(member.read_at(0, 20).unwrap(), &expected[..20]);
    assert_eq!(member.read_at(0, 500).unwrap(), expected);

    // The rooted spelling names the same member
    let rooted = PathSpec::container_member(TypeIndicator::Zip, root(), "/a.txt").unwrap();
    assert_eq!(rooted, leaf);
    let again = context.resolve_file_object(&rooted).unwrap();
    assert!(FileObjectHandle::ptr_eq(&member, &again));
    assert_eq!(context.reference_count(&leaf), 2);

    let sibling = context
        .resolve_file_object(&PathSpec::container_member(TypeIndicator::Zip, root(), "/b.txt").unwrap())
        .unwrap();
    assert_eq!(sibling.read_at(0, 10).unwrap(), &root_bytes()[600..610]);

    assert_eq!(parse_calls.load(Ordering::SeqCst), 1);
    assert_eq!(context.file_system_reference_count(&leaf.container_root()), 2);

    drop((member, again, sibling));
    assert_eq!(context.cached_count(), 0);
}

#[test]
fn closing_context_force_closes_everything() {
    let (context, counters, _) = setup(ResolverConfig::default());
    let spec = recording(root());
    let range = PathSpec::data_range(spec.clone(), 10, 10).unwrap();

    let outer = context.resolve_file_object(&range).unwrap();
    let inner = context.resolve_file_object(&spec).unwrap();
    assert_eq!(context.reference_count(&spec), 2);

    context.close();
    assert_eq!(counters.closed(), 1);
    assert_eq!(context.cached_count(), 0);
    assert!(matches!(outer.read_at(0, 1), Err(VfsError::Closed { .. })));
    assert!(matches!(
        context.resolve_file_object(&spec),
        Err(VfsError::Closed { .. })
    ));

    // Handles released after teardown do not close twice
    drop((outer, inner));
    assert_eq!(counters.closed(), 1);
}

#[test]
fn dropping_last_context_clone_closes_everything() {
    let (context, counters, _) = setup(ResolverConfig::default());
    let clone = context.clone();
    let handle = context.resolve_file_object(&recording(root())).unwrap();

    drop(context);
    assert_eq!(counters.closed(), 0);
    drop(clone);
    assert_eq!(counters.closed(), 1);
    assert!(handle.read_at(0, 1).is_err());
}

#[test]
fn limits_are_resource_exhausted() {
    let (context, _, _) = setup(ResolverConfig {
        max_depth: 3,
        max_open_objects: 3,
        ..ResolverConfig::default()
    });

    let mut spec = root();
    for _ in 0..3 {
        spec = PathSpec::data_range(spec, 0, 100).unwrap();
    }
    assert!(matches!(
        context.resolve_file_object(&spec),
        Err(VfsError::ResourceExhausted { .. })
    ));

    let _a = context.resolve_file_object(&PathSpec::data_range(root(), 0, 1).unwrap()).unwrap();
    let _b = context.resolve_file_object(&PathSpec::data_range(root(), 1, 1).unwrap()).unwrap();
    assert!(matches!(
        context.resolve_file_object(&PathSpec::data_range(root(), 2, 1).unwrap()),
        Err(VfsError::ResourceExhausted { .. })
    ));
}

#[test]
fn concurrent_resolution_converges_on_one_entry() {
    let (context, counters, _) = setup(ResolverConfig::default());
    let spec = recording(root());
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let context = context.clone();
            let spec = spec.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let handle = context.resolve_file_object(&spec).expect("resolve");
                handle.read_at(0, 4).expect("read")
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), vec![0, 1, 2, 3]);
    }

    assert_eq!(context.cached_count(), 0);
    assert_eq!(counters.opened(), counters.closed());
}

#[test]
fn os_file_through_range_and_gzip() {
    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(b"Oct 16 12:00:01 host sshd[42]: session opened\n").unwrap();
    let gz = gz.finish().unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"JUNKJUNK").unwrap();
    file.write_all(&gz).unwrap();
    file.write_all(b"TRAILER").unwrap();
    file.flush().unwrap();

    let context = ResolutionContext::with_registry(Arc::new(ResolverRegistry::with_defaults()));
    let os = PathSpec::os(file.path().to_string_lossy()).unwrap();
    let range = PathSpec::data_range(os, 8, gz.len() as u64).unwrap();
    let spec = PathSpec::compressed_stream(range, CompressionMethod::Gzip).unwrap();

    let object = context.resolve_file_object(&spec).unwrap();
    assert_eq!(object.read_at(16, 4).unwrap(), b"host");
    assert_eq!(object.size().unwrap(), 46);

    // A spec rebuilt from JSON is the same cache key
    let reloaded = PathSpec::from_json(&spec.to_json().unwrap()).unwrap();
    let again = context.resolve_file_object(&reloaded).unwrap();
    assert_eq!(context.reference_count(&spec), 2);
    drop((object, again));
    assert_eq!(context.cached_count(), 0);
}
