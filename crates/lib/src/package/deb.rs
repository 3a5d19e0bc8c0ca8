//! Debian-style binary packages.
//!
//! The package is an `ar` container with three members, in this order:
//!
//! ```text
//! debian-binary    "2.0\n"
//! control.tar.gz   control file (with Installed-Size) + maintainer scripts
//! data.tar.gz      everything the data producers enumerated
//! ```
//!
//! Data is produced first so the installed size is known when the control
//! archive is written. The finished package is staged beside the destination
//! and renamed into place.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};
use tracing::{debug, info};

use super::control::ControlFields;
use super::{ArchiveInfo, BuildDescriptor, ControlFileSet, PackageError, PackagingEngine};
use crate::consts::{
  CONTROL_FILE, CONTROL_MEMBER, DATA_MEMBER, DEBIAN_BINARY, DEBIAN_BINARY_MEMBER, DEFAULT_ARCHITECTURE,
  DEFAULT_DISTRIBUTION, DEFAULT_URGENCY, MAINTAINER_SCRIPTS,
};
use crate::producer::{DataConsumer, DataProducer};
use crate::util::hash::hash_file;
use crate::util::staging::{StagedFile, parent_dir};

const AR_MEMBER_MODE: u32 = 0o100644;
const SYNTHESIZED_DIR_MODE: u32 = 0o755;

/// Builds `.deb` packages.
#[derive(Debug, Clone, Default)]
pub struct DebPackager {
  mtime: Option<u64>,
}

impl DebPackager {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stamp every archive entry with this time instead of the current time.
  pub fn with_mtime(mut self, mtime: u64) -> Self {
    self.mtime = Some(mtime);
    self
  }

  fn mtime(&self) -> u64 {
    self.mtime.unwrap_or_else(|| {
      SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
    })
  }
}

impl PackagingEngine for DebPackager {
  fn build(
    &self,
    control: &ControlFileSet,
    producers: &[Box<dyn DataProducer>],
    destination: &Path,
  ) -> Result<BuildDescriptor, PackageError> {
    let write_err = |source| PackageError::Write {
      path: destination.to_path_buf(),
      source,
    };

    let mut fields = read_control(control)?;
    let mtime = self.mtime();

    let data = build_data(producers, mtime).map_err(|e| match e {
      DataError::Producer(e) => PackageError::Producer(e),
      DataError::Io(e) => write_err(e),
    })?;

    let installed_size = data.installed_bytes.div_ceil(1024);
    fields.set("Installed-Size", installed_size.to_string());
    if fields.get("Architecture").is_none() {
      fields.set("Architecture", DEFAULT_ARCHITECTURE);
    }

    let control_tar = build_control_tar(control, &fields, mtime)?;

    fs::create_dir_all(parent_dir(destination)).map_err(write_err)?;
    let mut staged = StagedFile::new(destination).map_err(write_err)?;
    write_package(staged.file_mut(), &control_tar, data.file, data.size, mtime).map_err(write_err)?;
    staged.commit().map_err(write_err)?;

    let (sha256, size) = hash_file(destination)?;
    let descriptor = describe(&fields, destination, sha256.0, size, installed_size, data.entries);

    info!(
      package = %descriptor.package,
      version = %descriptor.version,
      path = %destination.display(),
      size,
      "package written"
    );
    Ok(descriptor)
  }
}

fn read_control(control: &ControlFileSet) -> Result<ControlFields, PackageError> {
  let path = control.get(CONTROL_FILE).ok_or_else(|| {
    PackageError::MalformedControl(format!(
      "no '{}' file in {}",
      CONTROL_FILE,
      control.dir().display()
    ))
  })?;
  let text = fs::read_to_string(path).map_err(|source| PackageError::ReadControl {
    path: path.to_path_buf(),
    source,
  })?;

  let fields = ControlFields::parse(&text)?;
  fields.check()?;
  Ok(fields)
}

fn describe(
  fields: &ControlFields,
  destination: &Path,
  sha256: String,
  size: u64,
  installed_size: u64,
  data_entries: usize,
) -> BuildDescriptor {
  let field = |name: &str, default: &str| fields.get(name).unwrap_or(default).to_string();
  BuildDescriptor {
    package: field("Package", ""),
    version: field("Version", ""),
    architecture: field("Architecture", DEFAULT_ARCHITECTURE),
    maintainer: field("Maintainer", ""),
    description: field("Description", ""),
    distribution: field("Distribution", DEFAULT_DISTRIBUTION),
    urgency: field("Urgency", DEFAULT_URGENCY),
    installed_size,
    data_entries,
    control: fields.fields().to_vec(),
    archive: ArchiveInfo {
      path: destination.to_path_buf(),
      file_name: destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default(),
      size,
      sha256,
    },
  }
}

fn write_package(out: &mut File, control_tar: &[u8], mut data: File, data_size: u64, mtime: u64) -> io::Result<()> {
  let mut ar = super::ar::ArWriter::new(BufWriter::new(out))?;
  ar.append_bytes(DEBIAN_BINARY_MEMBER, mtime, AR_MEMBER_MODE, DEBIAN_BINARY)?;
  ar.append_bytes(CONTROL_MEMBER, mtime, AR_MEMBER_MODE, control_tar)?;
  ar.append(DATA_MEMBER, mtime, AR_MEMBER_MODE, data_size, &mut data)?;
  ar.into_inner().flush()
}

fn build_control_tar(control: &ControlFileSet, fields: &ControlFields, mtime: u64) -> Result<Vec<u8>, PackageError> {
  let tar_err = |source| PackageError::Write {
    path: control.dir().join(CONTROL_MEMBER),
    source,
  };

  let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

  let rendered = fields.render();
  let mut header = entry_header(EntryType::Regular, 0o644, rendered.len() as u64, mtime).map_err(tar_err)?;
  builder
    .append_data(&mut header, CONTROL_FILE, rendered.as_bytes())
    .map_err(tar_err)?;

  for path in control.files() {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
      continue;
    };
    if name == CONTROL_FILE {
      continue;
    }

    let content = fs::read(path).map_err(|source| PackageError::ReadControl {
      path: path.clone(),
      source,
    })?;
    let mode = if MAINTAINER_SCRIPTS.contains(&name) { 0o755 } else { 0o644 };
    debug!(file = name, mode = %format!("{:o}", mode), "adding control file");

    let mut header = entry_header(EntryType::Regular, mode, content.len() as u64, mtime).map_err(tar_err)?;
    builder
      .append_data(&mut header, name, content.as_slice())
      .map_err(tar_err)?;
  }

  builder
    .into_inner()
    .and_then(|gz| gz.finish())
    .map_err(tar_err)
}

fn entry_header(entry_type: EntryType, mode: u32, size: u64, mtime: u64) -> io::Result<Header> {
  let mut header = Header::new_gnu();
  header.set_entry_type(entry_type);
  header.set_mode(mode);
  header.set_size(size);
  header.set_mtime(mtime);
  header.set_uid(0);
  header.set_gid(0);
  header.set_username("root")?;
  header.set_groupname("root")?;
  Ok(header)
}

enum DataError {
  Producer(crate::producer::ProducerError),
  Io(io::Error),
}

struct DataArchive {
  file: File,
  size: u64,
  installed_bytes: u64,
  entries: usize,
}

/// Run every producer into a gzip'd tarball held in an anonymous temp file.
fn build_data(producers: &[Box<dyn DataProducer>], mtime: u64) -> Result<DataArchive, DataError> {
  let file = tempfile::tempfile().map_err(DataError::Io)?;
  let mut collector = DataCollector::new(GzEncoder::new(file, Compression::default()), mtime);

  for producer in producers {
    debug!(producer = ?producer, "producing data");
    producer.produce(&mut collector).map_err(DataError::Producer)?;
  }

  let installed_bytes = collector.installed_bytes;
  let entries = collector.kinds.len();
  let mut file = collector
    .builder
    .into_inner()
    .and_then(|gz| gz.finish())
    .map_err(DataError::Io)?;

  let size = file.seek(SeekFrom::End(0)).map_err(DataError::Io)?;
  file.seek(SeekFrom::Start(0)).map_err(DataError::Io)?;
  debug!(entries, installed_bytes, size, "data archive complete");

  Ok(DataArchive {
    file,
    size,
    installed_bytes,
    entries,
  })
}

/// Writes produced entries into the data tarball.
///
/// Parent directories that no producer emitted are added on demand. A path
/// may appear once, except that repeated directories are merged.
struct DataCollector<W: Write> {
  builder: tar::Builder<W>,
  mtime: u64,
  /// Path -> whether the entry is a directory.
  kinds: HashMap<String, bool>,
  installed_bytes: u64,
}

impl<W: Write> DataCollector<W> {
  fn new(writer: W, mtime: u64) -> Self {
    Self {
      builder: tar::Builder::new(writer),
      mtime,
      kinds: HashMap::new(),
      installed_bytes: 0,
    }
  }

  fn ensure_parents(&mut self, path: &str) -> io::Result<()> {
    let mut end = 0;
    while let Some(pos) = path[end..].find('/') {
      let parent = &path[..end + pos];
      end += pos + 1;
      match self.kinds.get(parent) {
        Some(true) => {}
        Some(false) => {
          return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} is not a directory but {} is inside it", parent, path),
          ));
        }
        None => self.append_directory(parent, SYNTHESIZED_DIR_MODE)?,
      }
    }
    Ok(())
  }

  fn claim(&mut self, path: &str) -> io::Result<()> {
    if self.kinds.contains_key(path) {
      return Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("duplicate entry {}", path),
      ));
    }
    self.ensure_parents(path)?;
    self.kinds.insert(path.to_string(), false);
    Ok(())
  }

  fn append_directory(&mut self, path: &str, mode: u32) -> io::Result<()> {
    let mut header = entry_header(EntryType::Directory, mode, 0, self.mtime)?;
    self.builder.append_data(&mut header, path, io::empty())?;
    self.kinds.insert(path.to_string(), true);
    Ok(())
  }
}

impl<W: Write> DataConsumer for DataCollector<W> {
  fn on_directory(&mut self, path: &str, mode: u32) -> io::Result<()> {
    match self.kinds.get(path) {
      Some(true) => Ok(()),
      Some(false) => Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("duplicate entry {}", path),
      )),
      None => {
        self.ensure_parents(path)?;
        self.append_directory(path, mode)
      }
    }
  }

  fn on_file(&mut self, path: &str, mode: u32, size: u64, content: &mut dyn Read) -> io::Result<()> {
    self.claim(path)?;
    let mut header = entry_header(EntryType::Regular, mode, size, self.mtime)?;
    self.builder.append_data(&mut header, path, content.take(size))?;
    self.installed_bytes += size;
    Ok(())
  }

  fn on_symlink(&mut self, path: &str, target: &str) -> io::Result<()> {
    self.claim(path)?;
    let mut header = entry_header(EntryType::Symlink, 0o777, 0, self.mtime)?;
    self.builder.append_link(&mut header, path, target)
  }
}
