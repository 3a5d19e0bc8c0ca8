//! Test utilities for debforge-lib.
//!
//! Helpers for producing fixture archives and for taking built packages apart
//! again so tests can assert on their contents.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::producer::{DataConsumer, DataProducer};

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
  Directory { mode: u32 },
  File { mode: u32, content: Vec<u8> },
  Symlink { target: String },
}

/// A consumer that remembers everything it was given, in order.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
  pub entries: Vec<(String, Recorded)>,
}

impl RecordingConsumer {
  pub fn paths(&self) -> Vec<String> {
    self.entries.iter().map(|(path, _)| path.clone()).collect()
  }

  fn find(&self, path: &str) -> Option<&Recorded> {
    self.entries.iter().find(|(p, _)| p == path).map(|(_, entry)| entry)
  }

  pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
    match self.find(path) {
      Some(Recorded::File { content, .. }) => Some(content.clone()),
      _ => None,
    }
  }

  pub fn mode_of(&self, path: &str) -> Option<u32> {
    match self.find(path) {
      Some(Recorded::File { mode, .. }) | Some(Recorded::Directory { mode }) => Some(*mode),
      _ => None,
    }
  }

  pub fn symlink_target(&self, path: &str) -> Option<String> {
    match self.find(path) {
      Some(Recorded::Symlink { target }) => Some(target.clone()),
      _ => None,
    }
  }
}

impl DataConsumer for RecordingConsumer {
  fn on_directory(&mut self, path: &str, mode: u32) -> io::Result<()> {
    self.entries.push((path.to_string(), Recorded::Directory { mode }));
    Ok(())
  }

  fn on_file(&mut self, path: &str, mode: u32, _size: u64, content: &mut dyn Read) -> io::Result<()> {
    let mut buf = Vec::new();
    content.read_to_end(&mut buf)?;
    self.entries.push((path.to_string(), Recorded::File { mode, content: buf }));
    Ok(())
  }

  fn on_symlink(&mut self, path: &str, target: &str) -> io::Result<()> {
    self.entries.push((
      path.to_string(),
      Recorded::Symlink {
        target: target.to_string(),
      },
    ));
    Ok(())
  }
}

pub fn boxed(producer: impl DataProducer + 'static) -> Box<dyn DataProducer> {
  Box::new(producer)
}

/// Write a tarball holding regular files.
pub fn write_tarball(path: &Path, gzip: bool, files: &[(&str, &str)]) {
  let file = fs::File::create(path).unwrap();
  if gzip {
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    append_files(&mut builder, files);
    builder.into_inner().unwrap().finish().unwrap();
  } else {
    let mut builder = tar::Builder::new(file);
    append_files(&mut builder, files);
    builder.finish().unwrap();
  }
}

fn append_files<W: io::Write>(builder: &mut tar::Builder<W>, files: &[(&str, &str)]) {
  for (name, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, name, content.as_bytes()).unwrap();
  }
}

/// Write a minimal control directory with the given `control` contents.
pub fn write_control_dir(dir: &Path, control: &str) {
  fs::create_dir_all(dir).unwrap();
  fs::write(dir.join("control"), control).unwrap();
}

pub const SAMPLE_CONTROL: &str = "\
Package: hello
Version: 1.2.3
Architecture: amd64
Maintainer: Jane Doe <jane@example.org>
Description: greets the world
 A longer description
 spanning two lines.
";

/// Split an `ar` archive into its members.
pub fn read_ar(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
  assert_eq!(&bytes[..8], b"!<arch>\n", "not an ar archive");
  let mut members = Vec::new();
  let mut offset = 8;
  while offset < bytes.len() {
    let header = &bytes[offset..offset + 60];
    let name = String::from_utf8_lossy(&header[..16]).trim_end().trim_end_matches('/').to_string();
    let size: usize = String::from_utf8_lossy(&header[48..58]).trim().parse().unwrap();
    assert_eq!(&header[58..60], b"`\n");
    let start = offset + 60;
    members.push((name, bytes[start..start + size].to_vec()));
    offset = start + size + (size % 2);
  }
  members
}

/// Entries of a gzip'd tarball keyed by path: (entry type byte, mode, content).
pub fn read_tar_gz(bytes: &[u8]) -> BTreeMap<String, (u8, u32, Vec<u8>)> {
  let mut archive = tar::Archive::new(GzDecoder::new(bytes));
  let mut entries = BTreeMap::new();
  for entry in archive.entries().unwrap() {
    let mut entry = entry.unwrap();
    let path = entry.path().unwrap().to_string_lossy().trim_end_matches('/').to_string();
    let kind = entry.header().entry_type().as_byte();
    let mode = entry.header().mode().unwrap();
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    entries.insert(path, (kind, mode, content));
  }
  entries
}

/// Members of a built package keyed by name.
pub fn read_package(path: &Path) -> BTreeMap<String, Vec<u8>> {
  read_ar(&fs::read(path).unwrap()).into_iter().collect()
}
