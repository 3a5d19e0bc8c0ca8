//! Package assembly.
//!
//! The orchestrator drives a `PackagingEngine`: control files plus data
//! producers in, a package archive on disk and a `BuildDescriptor` out.
//!
//! # Submodules
//!
//! - [`ar`] - Writer for the `ar` container format
//! - [`control`] - Control file (deb822) parsing and rendering
//! - [`deb`] - The Debian-style packager

pub mod ar;
pub mod control;
pub mod deb;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::producer::{DataProducer, ProducerError};
use crate::util::hash::HashError;

pub use control::ControlFields;
pub use deb::DebPackager;

/// Turns control files and content into a package archive.
pub trait PackagingEngine {
  fn build(
    &self,
    control: &ControlFileSet,
    producers: &[Box<dyn DataProducer>],
    destination: &Path,
  ) -> Result<BuildDescriptor, PackageError>;
}

/// Errors raised while assembling a package.
#[derive(Debug, Error)]
pub enum PackageError {
  #[error("failed to list control directory {path}: {source}")]
  ListControl {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read control file {path}: {source}")]
  ReadControl {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed control file: {0}")]
  MalformedControl(String),

  #[error("data producer failed: {0}")]
  Producer(#[from] ProducerError),

  #[error("failed to write package {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to checksum package: {0}")]
  Checksum(#[from] HashError),
}

/// The regular files directly inside a control directory, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFileSet {
  dir: PathBuf,
  files: Vec<PathBuf>,
}

impl ControlFileSet {
  /// List the control directory (non-recursive; subdirectories are ignored).
  pub fn scan(dir: &Path) -> Result<Self, PackageError> {
    let list_err = |source| PackageError::ListControl {
      path: dir.to_path_buf(),
      source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
      let entry = entry.map_err(list_err)?;
      let path = entry.path();
      if path.is_file() {
        files.push(path);
      }
    }
    files.sort();

    Ok(Self {
      dir: dir.to_path_buf(),
      files,
    })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn files(&self) -> &[PathBuf] {
    &self.files
  }

  /// The file with this name, if present.
  pub fn get(&self, name: &str) -> Option<&Path> {
    self
      .files
      .iter()
      .find(|path| path.file_name().and_then(|n| n.to_str()) == Some(name))
      .map(PathBuf::as_path)
  }
}

/// Location and checksum of a built package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
  pub path: PathBuf,
  pub file_name: String,
  pub size: u64,
  pub sha256: String,
}

/// Metadata summarizing a completed package build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
  pub package: String,
  pub version: String,
  pub architecture: String,
  pub maintainer: String,
  pub description: String,
  pub distribution: String,
  pub urgency: String,
  /// Installed size in KiB, as written to the control file.
  pub installed_size: u64,
  /// Number of entries in the data archive.
  pub data_entries: usize,
  /// The control fields as written into the package, in order.
  pub control: Vec<(String, String)>,
  pub archive: ArchiveInfo,
}

impl BuildDescriptor {
  /// Synopsis line of the description.
  pub fn summary(&self) -> &str {
    self.description.lines().next().unwrap_or_default().trim()
  }
}
