//! Input validation gate.
//!
//! Runs before anything touches the filesystem. Checks are ordered; the first
//! failing check is the one reported, since later checks are meaningless once
//! an earlier one fails.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::BuildConfig;

/// A caller-fixable configuration problem.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("'control' must point to the control directory (got {})", describe(.0.as_deref()))]
  Control(Option<PathBuf>),

  #[error("'changesOut' must be a file path to create, but {} is a directory", .0.display())]
  ChangesOutIsDirectory(PathBuf),

  #[error("'changesIn' must point to an existing release history file when 'changesOut' is set (got {})", describe(.0.as_deref()))]
  ChangesIn(Option<PathBuf>),

  #[error("'changesIn' and 'changesOut' both resolve to {}; the history file cannot also be the changes record", .0.display())]
  ChangesPathsCollide(PathBuf),

  #[error("no data producers given; provide at least one directory, archive or file with data")]
  NoDataProducers,

  #[error("'destfile' must point to where the package is created")]
  MissingDestination,

  #[error("'destfile' resolves to {}, which is also '{setting}'; the package would overwrite it", .path.display())]
  DestinationCollides { path: PathBuf, setting: &'static str },
}

fn describe(path: Option<&Path>) -> String {
  match path {
    Some(path) => path.display().to_string(),
    None => "nothing".to_string(),
  }
}

/// The paths of a configuration that passed validation.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedPaths<'a> {
  pub destination: &'a Path,
  pub control: &'a Path,
  /// `(changesIn, changesOut)` when a changes record was requested.
  pub changes: Option<(&'a Path, &'a Path)>,
}

/// Check a configuration without side effects.
pub fn validate(config: &BuildConfig) -> Result<ValidatedPaths<'_>, ConfigError> {
  let control = match config.control() {
    Some(control) if control.is_dir() => control,
    other => return Err(ConfigError::Control(other.map(Path::to_path_buf))),
  };

  let mut changes = None;
  if let Some(changes_out) = config.changes_out() {
    if changes_out.is_dir() {
      return Err(ConfigError::ChangesOutIsDirectory(changes_out.to_path_buf()));
    }

    let changes_in = match config.changes_in() {
      Some(changes_in) if changes_in.is_file() => changes_in,
      other => return Err(ConfigError::ChangesIn(other.map(Path::to_path_buf))),
    };

    if same_file(changes_in, changes_out) {
      return Err(ConfigError::ChangesPathsCollide(changes_in.to_path_buf()));
    }
    changes = Some((changes_in, changes_out));
  }

  if config.producers().is_empty() {
    return Err(ConfigError::NoDataProducers);
  }

  let Some(destination) = config.destination() else {
    return Err(ConfigError::MissingDestination);
  };

  if let Some((changes_in, changes_out)) = changes {
    for (setting, path) in [("changesIn", changes_in), ("changesOut", changes_out)] {
      if same_file(path, destination) {
        return Err(ConfigError::DestinationCollides {
          path: destination.to_path_buf(),
          setting,
        });
      }
    }
  }

  debug!(control = %control.display(), producers = config.producers().len(), "configuration valid");
  Ok(ValidatedPaths {
    destination,
    control,
    changes,
  })
}

/// Whether `a` and `b` name the same file.
///
/// Either may not exist yet; it is then resolved through its parent.
fn same_file(a: &Path, b: &Path) -> bool {
  match (resolve(a), resolve(b)) {
    (Ok(a), Ok(b)) => a == b,
    _ => false,
  }
}

fn resolve(path: &Path) -> io::Result<PathBuf> {
  if path.exists() {
    return dunce::canonicalize(path);
  }
  let file_name = path
    .file_name()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
  let parent = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  Ok(dunce::canonicalize(parent)?.join(file_name))
}
