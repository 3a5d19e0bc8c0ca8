//! Staged writes.
//!
//! Outputs are written to a temporary file in the target's directory and only
//! renamed over the target on `commit`. Dropping an uncommitted `StagedFile`
//! removes the temporary file, so failed writes never leave partial output.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::consts::STAGING_PREFIX;

#[derive(Debug)]
pub struct StagedFile {
  temp: NamedTempFile,
  target: PathBuf,
}

impl StagedFile {
  /// Stage a write to `target`. The target's directory must exist.
  pub fn new(target: &Path) -> io::Result<Self> {
    let temp = tempfile::Builder::new()
      .prefix(STAGING_PREFIX)
      .suffix(".tmp")
      .tempfile_in(parent_dir(target))?;
    Ok(Self {
      temp,
      target: target.to_path_buf(),
    })
  }

  pub fn target(&self) -> &Path {
    &self.target
  }

  pub fn file_mut(&mut self) -> &mut File {
    self.temp.as_file_mut()
  }

  /// Flush the staged contents to disk without committing.
  pub fn sync(&self) -> io::Result<()> {
    self.temp.as_file().sync_all()
  }

  /// Flush to disk and rename over the target.
  ///
  /// An existing target keeps its permissions; a new one gets 0644 on unix.
  pub fn commit(self) -> io::Result<()> {
    self.sync()?;

    match fs::metadata(&self.target) {
      Ok(metadata) => fs::set_permissions(self.temp.path(), metadata.permissions())?,
      Err(e) if e.kind() == io::ErrorKind::NotFound => set_default_permissions(self.temp.path())?,
      Err(e) => return Err(e),
    }

    self.temp.persist(&self.target).map_err(|e| e.error)?;
    Ok(())
  }
}

/// Directory a file path lives in; `.` for bare file names.
pub fn parent_dir(path: &Path) -> &Path {
  match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  }
}

#[cfg(unix)]
fn set_default_permissions(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_path: &Path) -> io::Result<()> {
  Ok(())
}
