//! vpath - resolve path specifications from the command line
//!
//! Prints the chain and size of each specification, or writes the selected
//! bytes of its resolved stream to stdout.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

use vpath::compression::{detect_by_extension, detect_compression_method};
use vpath::{
    FileObject, FileObjectHandle, FileObjectReader, PathSpec, ResolutionContext, ResolverConfig,
    ResolverRegistry,
};

/// Bytes read from an OS file to sniff its compression format
const MAGIC_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    /// JSON specification file, `-` for stdin
    SpecFile(String),
    /// Host file given with `--os`
    Os(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Info,
    Cat,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    mode: Mode,
    offset: u64,
    length: Option<u64>,
    detect: bool,
}

fn cli() -> Command {
    let command = Command::new("vpath")
        .version(vpath::VERSION)
        .about("Resolve path specifications to byte streams")
        .long_about(
            "vpath resolves path specifications (JSON chains of typed segments such as \
             OS -> DATA_RANGE -> COMPRESSED_STREAM) and prints their chain and size, or \
             writes their decoded bytes to stdout.",
        )
        .arg(
            Arg::new("spec")
                .help("Path specification JSON files, `-` reads one from stdin")
                .num_args(0..)
                .index(1),
        )
        .arg(
            Arg::new("os")
                .long("os")
                .value_name("PATH")
                .help("Resolve a host file directly")
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("detect")
                .long("detect")
                .help("Wrap --os inputs in a compressed stream when a known format is detected")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("info")
                .long("info")
                .help("Print the chain and size of each input (default)")
                .action(ArgAction::SetTrue)
                .conflicts_with("cat"),
        )
        .arg(
            Arg::new("cat")
                .long("cat")
                .help("Write the bytes of each input to stdout")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("offset")
                .long("offset")
                .value_name("N")
                .help("First byte written by --cat")
                .value_parser(value_parser!(u64))
                .default_value("0"),
        )
        .arg(
            Arg::new("length")
                .long("length")
                .value_name("N")
                .help("Maximum number of bytes written by --cat")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .value_name("N")
                .help("Inputs resolved concurrently")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .value_name("N")
                .help("Maximum path specification depth")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("max-open")
                .long("max-open")
                .value_name("N")
                .help("Maximum cached objects per input")
                .value_parser(value_parser!(usize)),
        );

    #[cfg(feature = "config")]
    let command = command.arg(
        Arg::new("config")
            .long("config")
            .value_name("FILE")
            .help("Configuration file (defaults to $CONFIG_DIR/vpath/config.toml)")
            .value_parser(value_parser!(PathBuf)),
    );

    command
}

fn collect_inputs(matches: &ArgMatches) -> Result<Vec<Input>> {
    let mut inputs: Vec<Input> = matches
        .get_many::<String>("spec")
        .into_iter()
        .flatten()
        .map(|source| Input::SpecFile(source.clone()))
        .collect();
    inputs.extend(
        matches
            .get_many::<PathBuf>("os")
            .into_iter()
            .flatten()
            .map(|path| Input::Os(path.clone())),
    );

    if inputs.is_empty() {
        bail!("no input given: pass specification files or --os PATH");
    }
    let from_stdin = inputs
        .iter()
        .filter(|input| matches!(input, Input::SpecFile(source) if source == "-"))
        .count();
    if from_stdin > 1 {
        bail!("stdin (`-`) can only be given once");
    }
    Ok(inputs)
}

fn load_config(matches: &ArgMatches) -> Result<ResolverConfig> {
    #[cfg(feature = "config")]
    let mut config = ResolverConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("failed to load configuration")?;
    #[cfg(not(feature = "config"))]
    let mut config = ResolverConfig::default();

    // Flags override file values
    if let Some(&max_depth) = matches.get_one::<usize>("max-depth") {
        config.max_depth = max_depth;
    }
    if let Some(&max_open) = matches.get_one::<usize>("max-open") {
        config.max_open_objects = max_open;
    }
    config.validate()?;
    Ok(config)
}

fn read_spec(source: &str) -> Result<PathSpec> {
    let text = if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read specification from stdin")?;
        text
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read specification file: {source}"))?
    };
    PathSpec::from_json(&text).with_context(|| format!("invalid specification in {source}"))
}

/// Specification for `input`.
///
/// With detection, the handle opened to sniff the OS file is returned too;
/// holding it keeps the file cached while the wrapped specification resolves.
fn build_spec(
    input: &Input,
    context: &ResolutionContext,
    detect: bool,
) -> Result<(PathSpec, Option<FileObjectHandle>)> {
    let path = match input {
        Input::SpecFile(source) => return Ok((read_spec(source)?, None)),
        Input::Os(path) => path,
    };

    let spec = PathSpec::os(path.to_string_lossy())?;
    if !detect {
        return Ok((spec, None));
    }

    let root = context.resolve_file_object(&spec)?;
    let magic = root.read_at(0, MAGIC_LEN)?;
    match detect_compression_method(&magic).or_else(|| detect_by_extension(path)) {
        Some(method) => {
            log::debug!("detected {method} compression in {}", path.display());
            Ok((PathSpec::compressed_stream(spec, method)?, Some(root)))
        }
        None => Ok((spec, Some(root))),
    }
}

/// Resolve one input in its own context and render its output
fn process(
    input: &Input,
    registry: Arc<ResolverRegistry>,
    config: ResolverConfig,
    job: Job,
) -> Result<Vec<u8>> {
    let context = ResolutionContext::new(registry, config)?;
    let (spec, _root) = build_spec(input, &context, job.detect)?;
    let object = context
        .resolve_file_object(&spec)
        .with_context(|| format!("failed to resolve {spec}"))?;

    let output = match job.mode {
        Mode::Info => {
            let size = object
                .size()
                .with_context(|| format!("failed to determine size of {spec}"))?;
            format!(
                "{spec}\n  json: {}\n  size: {size} bytes\n  cached objects: {}\n",
                spec.to_json()?,
                context.cached_count()
            )
            .into_bytes()
        }
        Mode::Cat => {
            let mut reader = FileObjectReader::new(object);
            reader.seek(SeekFrom::Start(job.offset))?;
            let mut data = Vec::new();
            match job.length {
                Some(length) => reader.take(length).read_to_end(&mut data),
                None => reader.read_to_end(&mut data),
            }
            .with_context(|| format!("failed to read {spec}"))?;
            data
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG controls verbosity)
    env_logger::init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    let inputs = collect_inputs(&matches)?;
    let job = Job {
        mode: if matches.get_flag("cat") {
            Mode::Cat
        } else {
            Mode::Info
        },
        offset: matches.get_one::<u64>("offset").copied().unwrap_or(0),
        length: matches.get_one::<u64>("length").copied(),
        detect: matches.get_flag("detect"),
    };
    let jobs = matches
        .get_one::<usize>("jobs")
        .copied()
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(4, |n| n.get()))
        .max(1);

    let registry = ResolverRegistry::global();
    let semaphore = Arc::new(Semaphore::new(jobs));
    let total = inputs.len();

    let mut tasks = Vec::with_capacity(total);
    for input in inputs {
        let semaphore = Arc::clone(&semaphore);
        let registry = Arc::clone(&registry);
        let config = config.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .context("worker pool closed")?;
            tokio::task::spawn_blocking(move || process(&input, registry, config, job))
                .await
                .context("worker task panicked")?
        }));
    }

    // Outputs are written in input order
    let mut stdout = std::io::stdout();
    let mut failures = 0;
    for task in tasks {
        match task.await.context("worker task panicked")? {
            Ok(output) => stdout.write_all(&output)?,
            Err(e) => {
                failures += 1;
                eprintln!("vpath: {e:#}");
            }
        }
    }
    stdout.flush()?;

    if failures > 0 {
        bail!("{failures} of {total} inputs failed");
    }
    Ok(())
}
