//! Data producers.
//!
//! A producer enumerates the entries that end up in the package's data
//! archive. The packager only sees the `DataConsumer` callbacks, so new kinds
//! of content source plug in without touching the packaging or orchestration
//! code.
//!
//! # Submodules
//!
//! - [`archive`] - Entries read from a `.tar` or `.tar.gz`
//! - [`directory`] - Entries walked from a directory tree
//! - [`file`] - A single file installed at an explicit path

pub mod archive;
pub mod directory;
pub mod file;

use std::fmt;
use std::io::{self, Read};
use std::path::{Component, Path};

use thiserror::Error;

pub use archive::ArchiveProducer;
pub use directory::DirectoryProducer;
pub use file::FileProducer;

/// Receives the entries enumerated by a producer.
///
/// Paths are normalized install paths (`usr/share/doc/foo`), relative and
/// `/`-separated.
pub trait DataConsumer {
  fn on_directory(&mut self, path: &str, mode: u32) -> io::Result<()>;

  fn on_file(&mut self, path: &str, mode: u32, size: u64, content: &mut dyn Read) -> io::Result<()>;

  fn on_symlink(&mut self, path: &str, target: &str) -> io::Result<()>;
}

/// An opaque source of package content.
pub trait DataProducer: fmt::Debug {
  fn produce(&self, consumer: &mut dyn DataConsumer) -> Result<(), ProducerError>;
}

/// Errors raised while enumerating a producer.
#[derive(Debug, Error)]
pub enum ProducerError {
  #[error("failed to walk {root}: {message}")]
  Walk { root: String, message: String },

  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("invalid entry path {path}: {reason}")]
  InvalidPath { path: String, reason: &'static str },

  #[error("failed to add {path} to the package: {source}")]
  Consume {
    path: String,
    #[source]
    source: io::Error,
  },
}

/// Build the install path for `relative`, placed under `prefix`.
///
/// Returns an empty string for the root itself. Absolute prefixes are made
/// relative; `..` anywhere is rejected.
pub fn entry_path(prefix: Option<&str>, relative: &Path) -> Result<String, ProducerError> {
  let invalid = |reason| ProducerError::InvalidPath {
    path: relative.display().to_string(),
    reason,
  };

  let mut parts: Vec<String> = Vec::new();

  if let Some(prefix) = prefix {
    for part in prefix.split('/') {
      match part {
        "" | "." => {}
        ".." => return Err(invalid("prefix must not contain '..'")),
        part => parts.push(part.to_string()),
      }
    }
  }

  for component in relative.components() {
    match component {
      Component::Normal(part) => {
        let part = part.to_str().ok_or_else(|| invalid("path is not valid UTF-8"))?;
        parts.push(part.to_string());
      }
      Component::CurDir => {}
      Component::RootDir | Component::Prefix(_) => return Err(invalid("path must be relative")),
      Component::ParentDir => return Err(invalid("path must not contain '..'")),
    }
  }

  Ok(parts.join("/"))
}

/// Whether any component of `path` is named in `excludes`.
pub(crate) fn is_excluded(path: &Path, excludes: &[String]) -> bool {
  path.components().any(|component| match component {
    Component::Normal(name) => name.to_str().map(|name| excludes.iter().any(|e| e == name)).unwrap_or(false),
    _ => false,
  })
}
