//! Directory tree producer.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{DataConsumer, DataProducer, ProducerError, entry_path, is_excluded};

pub(crate) const DEFAULT_DIR_MODE: u32 = 0o755;
pub(crate) const DEFAULT_FILE_MODE: u32 = 0o644;

/// Produces every entry below `root`, sorted by file name.
#[derive(Debug, Clone)]
pub struct DirectoryProducer {
  root: PathBuf,
  prefix: Option<String>,
  excludes: Vec<String>,
}

impl DirectoryProducer {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      prefix: None,
      excludes: Vec::new(),
    }
  }

  /// Install everything below this path instead of the package root.
  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.prefix = Some(prefix.into());
    self
  }

  /// Skip entries with a path component of this name (e.g. `.git`).
  pub fn with_exclude(mut self, name: impl Into<String>) -> Self {
    self.excludes.push(name.into());
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

impl DataProducer for DirectoryProducer {
  fn produce(&self, consumer: &mut dyn DataConsumer) -> Result<(), ProducerError> {
    let root = &self.root;
    let walker = WalkDir::new(root)
      .sort_by_file_name()
      .min_depth(1)
      .into_iter()
      .filter_entry(|e| !is_excluded(e.path().strip_prefix(root).unwrap_or(e.path()), &self.excludes));

    for entry in walker {
      let entry = entry.map_err(|e| ProducerError::Walk {
        root: root.display().to_string(),
        message: e.to_string(),
      })?;
      let entry_fs_path = entry.path();
      let relative = entry_fs_path.strip_prefix(root).unwrap_or(entry_fs_path);
      let path = entry_path(self.prefix.as_deref(), relative)?;
      let read_err = |source| ProducerError::Read {
        path: entry_fs_path.display().to_string(),
        source,
      };
      let consume_err = |source| ProducerError::Consume {
        path: path.clone(),
        source,
      };

      let file_type = entry.file_type();
      if file_type.is_dir() {
        let metadata = entry.metadata().map_err(|e| ProducerError::Walk {
          root: root.display().to_string(),
          message: e.to_string(),
        })?;
        consumer
          .on_directory(&path, mode_of(&metadata, DEFAULT_DIR_MODE))
          .map_err(consume_err)?;
      } else if file_type.is_file() {
        let mut file = fs::File::open(entry_fs_path).map_err(read_err)?;
        let metadata = file.metadata().map_err(read_err)?;
        consumer
          .on_file(&path, mode_of(&metadata, DEFAULT_FILE_MODE), metadata.len(), &mut file)
          .map_err(consume_err)?;
      } else if file_type.is_symlink() {
        let target = fs::read_link(entry_fs_path).map_err(read_err)?;
        consumer
          .on_symlink(&path, &target.to_string_lossy())
          .map_err(consume_err)?;
      } else {
        debug!(path = %entry_fs_path.display(), "skipping special file");
      }
    }

    Ok(())
  }
}

/// Permission bits of `metadata`, or `default` where the platform has none.
#[cfg(unix)]
pub(crate) fn mode_of(metadata: &fs::Metadata, _default: u32) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub(crate) fn mode_of(_metadata: &fs::Metadata, default: u32) -> u32 {
  default
}
