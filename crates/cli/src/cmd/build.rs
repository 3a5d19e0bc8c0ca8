//! Implementation of the `debforge build` command.
//!
//! Turns command-line flags into a `BuildConfig`, runs the orchestrator and
//! prints what it reported.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use tracing::debug;

use debforge_lib::producer::{ArchiveProducer, DataProducer, DirectoryProducer, FileProducer};
use debforge_lib::{BuildConfig, BuildError, BuildOrchestrator, BuildReport, BuildState, MemorySink};

use crate::output::{
  OutputFormat, format_bytes, format_duration, print_error, print_json, print_stat, print_success, split_outcome,
  truncate_hash,
};

#[derive(Args, Debug)]
pub struct BuildArgs {
  /// Control directory holding the `control` file and maintainer scripts
  #[arg(long, value_name = "DIR")]
  control: Option<PathBuf>,

  /// Package file to create
  #[arg(long, value_name = "FILE")]
  destfile: Option<PathBuf>,

  /// Content to package: a directory, a tarball or a single file, with an optional `@PREFIX`
  #[arg(long = "data", value_name = "SPEC")]
  data: Vec<DataSpec>,

  /// Leave out files and directories with this name
  #[arg(long = "exclude", value_name = "NAME")]
  excludes: Vec<String>,

  /// Release history to read and update
  #[arg(long, value_name = "FILE")]
  changes_in: Option<PathBuf>,

  /// Changes file to create
  #[arg(long, value_name = "FILE")]
  changes_out: Option<PathBuf>,

  /// Keyring used to sign the changes file
  #[arg(long, env = "DEBFORGE_KEYRING", value_name = "FILE")]
  keyring: Option<PathBuf>,

  /// Id of the signing key in the keyring
  #[arg(long, env = "DEBFORGE_KEY", value_name = "ID")]
  key: Option<String>,

  /// Passphrase of a sealed signing key
  #[arg(long, env = "DEBFORGE_PASSPHRASE", hide_env_values = true)]
  passphrase: Option<String>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  output: OutputFormat,
}

/// `PATH` or `PATH@PREFIX`.
///
/// A string naming an existing path is always taken whole, so paths that
/// contain `@` (`node_modules/@types`) need no escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSpec {
  path: PathBuf,
  prefix: Option<String>,
}

impl FromStr for DataSpec {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if !s.is_empty() && Path::new(s).exists() {
      return Ok(Self {
        path: PathBuf::from(s),
        prefix: None,
      });
    }

    let (path, prefix) = match s.rsplit_once('@') {
      Some((path, prefix)) if !prefix.is_empty() => (path, Some(prefix.to_string())),
      Some((path, _)) => (path, None),
      None => (s, None),
    };
    if path.is_empty() {
      return Err(format!("missing path in data spec {:?}", s));
    }
    Ok(Self {
      path: PathBuf::from(path),
      prefix,
    })
  }
}

impl DataSpec {
  /// Pick the producer for this source by what is on disk.
  ///
  /// Anything that is not a file is treated as a directory. A source that does
  /// not exist fails when the package is built, after the configuration
  /// has been validated.
  fn into_producer(self, excludes: &[String]) -> Result<Box<dyn DataProducer>> {
    if !self.path.is_file() {
      if !self.path.exists() {
        debug!(path = %self.path.display(), "data source does not exist yet");
      }
      let mut producer = DirectoryProducer::new(&self.path);
      if let Some(prefix) = self.prefix {
        producer = producer.with_prefix(prefix);
      }
      for name in excludes {
        producer = producer.with_exclude(name.clone());
      }
      return Ok(Box::new(producer));
    }

    if is_tarball(&self.path) {
      let mut producer = ArchiveProducer::new(&self.path);
      if let Some(prefix) = self.prefix {
        producer = producer.with_prefix(prefix);
      }
      for name in excludes {
        producer = producer.with_exclude(name.clone());
      }
      return Ok(Box::new(producer));
    }

    let Some(file_name) = self.path.file_name().and_then(|n| n.to_str()) else {
      bail!("data source {} has no usable file name", self.path.display());
    };
    let destination = match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
      Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix, file_name),
      _ => file_name.to_string(),
    };
    Ok(Box::new(FileProducer::new(&self.path, destination)))
  }
}

fn is_tarball(path: &Path) -> bool {
  let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
  [".tar", ".tar.gz", ".tgz"].iter().any(|ext| name.ends_with(ext))
}

#[derive(Debug, Serialize)]
struct FailureOutput<'a> {
  error: String,
  state: BuildState,
  messages: &'a [String],
}

/// Execute the build command.
///
/// Missing `--control`, `--destfile` or `--data` are not rejected by clap so
/// that the library's validation names the missing setting.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let mut config = BuildConfig::new();
  if let Some(control) = args.control {
    config = config.with_control(control);
  }
  if let Some(destfile) = args.destfile {
    config = config.with_destination(destfile);
  }
  if let Some(changes_in) = args.changes_in {
    config = config.with_changes_in(changes_in);
  }
  if let Some(changes_out) = args.changes_out {
    config = config.with_changes_out(changes_out);
  }
  if let Some(keyring) = args.keyring {
    config = config.with_keyring(keyring);
  }
  if let Some(key) = args.key {
    config = config.with_key_id(key);
  }
  if let Some(passphrase) = args.passphrase {
    config = config.with_passphrase(passphrase);
  }
  for spec in args.data {
    config = config.with_boxed_producer(spec.into_producer(&args.excludes)?);
  }
  debug!(?config, "build configuration");

  let sink = MemorySink::new();
  let started = Instant::now();
  let result = BuildOrchestrator::new().run(&config, &sink);
  let messages = sink.messages();

  match result {
    Ok(report) => {
      if args.output.is_json() {
        print_json(&report)?;
      } else {
        for message in &messages {
          print_success(message);
        }
        print_report(&report);
        print_stat("Took", &format_duration(started.elapsed()));
      }
      Ok(())
    }
    Err(err) => {
      report_failure(&err, &messages, args.output)?;
      std::process::exit(1);
    }
  }
}

fn print_report(report: &BuildReport) {
  let descriptor = &report.descriptor;
  println!();
  print_stat("Package", &format!("{} {}", descriptor.package, descriptor.version));
  print_stat("Architecture", &descriptor.architecture);
  print_stat("Size", &format_bytes(descriptor.archive.size));
  print_stat("SHA-256", truncate_hash(&descriptor.archive.sha256));
  if let Some(changes) = &report.changes {
    print_stat("Release", &changes.release_version);
    print_stat("Signed", if changes.signed { "yes" } else { "no" });
  }
}

fn report_failure(err: &BuildError, messages: &[String], output: OutputFormat) -> Result<()> {
  if output.is_json() {
    return print_json(&FailureOutput {
      error: err.to_string(),
      state: err.state(),
      messages,
    });
  }

  let (succeeded, failure) = split_outcome(messages, true);
  for message in succeeded {
    print_success(message);
  }
  print_error(&failure.cloned().unwrap_or_else(|| err.to_string()));
  Ok(())
}
