//! Tar archive producer.
//!
//! Accepts plain and gzip-compressed tarballs; compression is detected from
//! the leading magic bytes rather than the file name.
//!
//! Hard links are emitted as regular files carrying their target's content.
//! Their targets are collected in a second pass over the archive, since a tar
//! stream cannot be rewound.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, warn};

use super::directory::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use super::{DataConsumer, DataProducer, ProducerError, entry_path, is_excluded};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A hard link waiting for its target's content.
#[derive(Debug)]
struct HardLink {
  path: String,
  /// Normalized archive path of the target, without the install prefix.
  target: String,
}

/// Produces the entries of a tarball.
#[derive(Debug, Clone)]
pub struct ArchiveProducer {
  path: PathBuf,
  prefix: Option<String>,
  excludes: Vec<String>,
}

impl ArchiveProducer {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      prefix: None,
      excludes: Vec::new(),
    }
  }

  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.prefix = Some(prefix.into());
    self
  }

  pub fn with_exclude(mut self, name: impl Into<String>) -> Self {
    self.excludes.push(name.into());
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn open(&self) -> io::Result<Box<dyn Read>> {
    let mut file = File::open(&self.path)?;
    let mut magic = [0u8; 2];
    let compressed = match file.read_exact(&mut magic) {
      Ok(()) => magic == GZIP_MAGIC,
      Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
      Err(e) => return Err(e),
    };
    file.seek(SeekFrom::Start(0))?;

    let reader = BufReader::new(file);
    if compressed {
      Ok(Box::new(GzDecoder::new(reader)))
    } else {
      Ok(Box::new(reader))
    }
  }
}

impl DataProducer for ArchiveProducer {
  fn produce(&self, consumer: &mut dyn DataConsumer) -> Result<(), ProducerError> {
    let read_err = |source| ProducerError::Read {
      path: self.path.display().to_string(),
      source,
    };

    let mut archive = Archive::new(self.open().map_err(read_err)?);
    let mut links = Vec::new();

    for entry in archive.entries().map_err(read_err)? {
      let mut entry = entry.map_err(read_err)?;
      let relative = entry.path().map_err(read_err)?.into_owned();
      if is_excluded(&relative, &self.excludes) {
        continue;
      }

      let path = entry_path(self.prefix.as_deref(), &relative)?;
      if path.is_empty() {
        continue;
      }

      let header = entry.header();
      let entry_type = header.entry_type();
      let size = entry.size();
      let consume_err = |source| ProducerError::Consume {
        path: path.clone(),
        source,
      };

      match entry_type {
        EntryType::Directory => {
          let mode = header.mode().unwrap_or(DEFAULT_DIR_MODE);
          consumer.on_directory(&path, mode).map_err(consume_err)?;
        }
        EntryType::Regular | EntryType::Continuous => {
          let mode = header.mode().unwrap_or(DEFAULT_FILE_MODE);
          consumer.on_file(&path, mode, size, &mut entry).map_err(consume_err)?;
        }
        EntryType::Symlink => {
          let target = entry
            .link_name()
            .map_err(read_err)?
            .ok_or_else(|| ProducerError::InvalidPath {
              path: relative.display().to_string(),
              reason: "symlink without a target",
            })?
            .to_string_lossy()
            .into_owned();
          consumer.on_symlink(&path, &target).map_err(consume_err)?;
        }
        EntryType::Link => {
          let target = entry
            .link_name()
            .map_err(read_err)?
            .ok_or_else(|| ProducerError::InvalidPath {
              path: relative.display().to_string(),
              reason: "hard link without a target",
            })?;
          let target = entry_path(None, &target)?;
          debug!(path = %path, target = %target, "deferring hard link");
          links.push(HardLink {
            path: path.clone(),
            target,
          });
        }
        other => {
          warn!(archive = %self.path.display(), path = %path, entry_type = ?other, "skipping unsupported entry");
        }
      }
    }

    if !links.is_empty() {
      self.resolve_links(&links, consumer)?;
    }
    Ok(())
  }
}

impl ArchiveProducer {
  /// Emit every hard link as a copy of its target's content.
  fn resolve_links(&self, links: &[HardLink], consumer: &mut dyn DataConsumer) -> Result<(), ProducerError> {
    let read_err = |source| ProducerError::Read {
      path: self.path.display().to_string(),
      source,
    };

    let mut resolved = vec![false; links.len()];
    let mut archive = Archive::new(self.open().map_err(read_err)?);

    for entry in archive.entries().map_err(read_err)? {
      let mut entry = entry.map_err(read_err)?;
      if !matches!(entry.header().entry_type(), EntryType::Regular | EntryType::Continuous) {
        continue;
      }
      let relative = entry.path().map_err(read_err)?.into_owned();
      let name = entry_path(None, &relative)?;
      if !links.iter().any(|link| link.target == name) {
        continue;
      }

      let mode = entry.header().mode().unwrap_or(DEFAULT_FILE_MODE);
      let mut content = Vec::new();
      entry.read_to_end(&mut content).map_err(read_err)?;

      for (link, done) in links.iter().zip(resolved.iter_mut()) {
        if link.target != name {
          continue;
        }
        consumer
          .on_file(&link.path, mode, content.len() as u64, &mut content.as_slice())
          .map_err(|source| ProducerError::Consume {
            path: link.path.clone(),
            source,
          })?;
        *done = true;
      }
    }

    match links.iter().zip(&resolved).find(|(_, done)| !**done) {
      Some((link, _)) => Err(ProducerError::InvalidPath {
        path: link.path.clone(),
        reason: "hard link target is not a regular file in the archive",
      }),
      None => Ok(()),
    }
  }
}
