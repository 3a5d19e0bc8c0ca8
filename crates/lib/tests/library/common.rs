//! Shared fixtures and instrumented engines.

use std::cell::Cell;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use debforge_lib::BuildConfig;
use debforge_lib::changes::{ChangesEngine, ChangesError, HistoryError, ReleaseHistory, SigningRequest, TextChangesEngine};
use debforge_lib::package::{BuildDescriptor, ControlFileSet, DebPackager, PackageError, PackagingEngine};
use debforge_lib::producer::{DataProducer, DirectoryProducer};
use tempfile::TempDir;

pub const CONTROL: &str = "\
Package: hello
Version: 1.2.3
Architecture: amd64
Maintainer: Jane Doe <jane@example.org>
Description: greets the world
";

/// A temp directory holding a control dir (2 files), a data dir (3 files)
/// and an empty release history.
pub struct Fixture {
  pub temp: TempDir,
}

impl Fixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let fx = Self { temp };
    fx.write("control/control", CONTROL);
    fx.write("control/postinst", "#!/bin/sh\nexit 0\n");
    fx.write("data/usr/bin/hello", "#!/bin/sh\necho hello\n");
    fx.write("data/usr/share/doc/hello/README", "hello\n");
    fx.write("data/etc/hello.conf", "greeting=hi\n");
    fx.write("hist.txt", "");
    fx
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  pub fn write(&self, relative: &str, content: &str) {
    let path = self.path(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  pub fn read(&self, relative: &str) -> String {
    fs::read_to_string(self.path(relative)).unwrap()
  }

  /// Control dir, destination and one directory producer.
  pub fn package_config(&self) -> BuildConfig {
    BuildConfig::new()
      .with_control(self.path("control"))
      .with_destination(self.path("out.pkg"))
      .with_producer(DirectoryProducer::new(self.path("data")))
  }

  pub fn changes_config(&self) -> BuildConfig {
    self
      .package_config()
      .with_changes_in(self.path("hist.txt"))
      .with_changes_out(self.path("out.changes"))
  }

  /// Every file under the fixture, with its contents.
  pub fn snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files = Vec::new();
    collect(self.temp.path(), &mut files);
    files.sort();
    files
  }
}

fn collect(dir: &Path, files: &mut Vec<(PathBuf, Vec<u8>)>) {
  for entry in fs::read_dir(dir).unwrap() {
    let path = entry.unwrap().path();
    if path.is_dir() {
      collect(&path, files);
    } else {
      files.push((path.clone(), fs::read(&path).unwrap()));
    }
  }
}

/// Wraps the real packager and counts calls.
#[derive(Default)]
pub struct CountingPackager {
  inner: DebPackager,
  pub calls: Cell<usize>,
}

impl PackagingEngine for CountingPackager {
  fn build(
    &self,
    control: &ControlFileSet,
    producers: &[Box<dyn DataProducer>],
    destination: &Path,
  ) -> Result<BuildDescriptor, PackageError> {
    self.calls.set(self.calls.get() + 1);
    self.inner.build(control, producers, destination)
  }
}

/// Always fails without touching the filesystem.
pub struct FailingPackager;

impl PackagingEngine for FailingPackager {
  fn build(&self, _: &ControlFileSet, _: &[Box<dyn DataProducer>], _: &Path) -> Result<BuildDescriptor, PackageError> {
    Err(PackageError::MalformedControl("injected failure".to_string()))
  }
}

/// Wraps the text engine, counts calls, and can fail while persisting history.
#[derive(Default)]
pub struct CountingChanges {
  inner: TextChangesEngine,
  pub fail_persist: bool,
  pub calls: Cell<usize>,
}

impl CountingChanges {
  pub fn failing_persist() -> Self {
    Self {
      fail_persist: true,
      ..Self::default()
    }
  }
}

impl ChangesEngine for CountingChanges {
  fn read_history(&self, input: &mut dyn Read) -> Result<ReleaseHistory, ChangesError> {
    self.calls.set(self.calls.get() + 1);
    self.inner.read_history(input)
  }

  fn build_signed(
    &self,
    descriptor: &BuildDescriptor,
    history: &mut ReleaseHistory,
    signing: SigningRequest<'_>,
    out: &mut dyn Write,
  ) -> Result<(), ChangesError> {
    self.calls.set(self.calls.get() + 1);
    self.inner.build_signed(descriptor, history, signing, out)
  }

  fn persist_history(&self, history: &ReleaseHistory, out: &mut dyn Write) -> Result<(), ChangesError> {
    self.calls.set(self.calls.get() + 1);
    if self.fail_persist {
      return Err(HistoryError::Write(io::Error::other("disk full")).into());
    }
    self.inner.persist_history(history, out)
  }
}
