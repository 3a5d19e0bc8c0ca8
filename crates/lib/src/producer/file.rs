//! Single file producer.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::directory::{DEFAULT_FILE_MODE, mode_of};
use super::{DataConsumer, DataProducer, ProducerError, entry_path};

/// Installs one file at an explicit destination path.
#[derive(Debug, Clone)]
pub struct FileProducer {
  path: PathBuf,
  destination: String,
  mode: Option<u32>,
}

impl FileProducer {
  pub fn new(path: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      destination: destination.into(),
      mode: None,
    }
  }

  /// Override the permission bits taken from the source file.
  pub fn with_mode(mut self, mode: u32) -> Self {
    self.mode = Some(mode);
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl DataProducer for FileProducer {
  fn produce(&self, consumer: &mut dyn DataConsumer) -> Result<(), ProducerError> {
    let path = entry_path(Some(&self.destination), Path::new(""))?;
    if path.is_empty() {
      return Err(ProducerError::InvalidPath {
        path: self.destination.clone(),
        reason: "destination names the package root",
      });
    }

    let read_err = |source| ProducerError::Read {
      path: self.path.display().to_string(),
      source,
    };
    let mut file = File::open(&self.path).map_err(read_err)?;
    let metadata = file.metadata().map_err(read_err)?;
    let mode = self.mode.unwrap_or_else(|| mode_of(&metadata, DEFAULT_FILE_MODE));

    consumer
      .on_file(&path, mode, metadata.len(), &mut file)
      .map_err(|source| ProducerError::Consume { path, source })
  }
}
