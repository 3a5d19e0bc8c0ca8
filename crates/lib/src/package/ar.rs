//! Writer for the common `ar` archive format.
//!
//! Only what a package needs: short member names, fixed owner, no symbol
//! table. Each member is a 60-byte ASCII header followed by the data, padded
//! to an even length.

use std::io::{self, Read, Write};

const AR_MAGIC: &[u8] = b"!<arch>\n";
const HEADER_LEN: usize = 60;
const MAX_NAME_LEN: usize = 16;

pub struct ArWriter<W: Write> {
  inner: W,
}

impl<W: Write> ArWriter<W> {
  pub fn new(mut inner: W) -> io::Result<Self> {
    inner.write_all(AR_MAGIC)?;
    Ok(Self { inner })
  }

  /// Append a member of exactly `size` bytes read from `content`.
  pub fn append(&mut self, name: &str, mtime: u64, mode: u32, size: u64, content: &mut dyn Read) -> io::Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || !name.is_ascii() {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("ar member name {:?} must be 1-{} ASCII bytes", name, MAX_NAME_LEN),
      ));
    }

    let mtime = fit_field("mtime", mtime.to_string(), 12)?;
    let mode = fit_field("mode", format!("{:o}", mode), 8)?;
    let size_field = fit_field("size", size.to_string(), 10)?;

    let header = format!("{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n", name, mtime, 0, 0, mode, size_field);
    if header.len() != HEADER_LEN {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("ar header for {} is {} bytes", name, header.len()),
      ));
    }
    self.inner.write_all(header.as_bytes())?;

    let copied = io::copy(&mut content.take(size), &mut self.inner)?;
    if copied != size {
      return Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("ar member {} ended after {} of {} bytes", name, copied, size),
      ));
    }
    if size % 2 == 1 {
      self.inner.write_all(b"\n")?;
    }
    Ok(())
  }

  /// Append an in-memory member.
  pub fn append_bytes(&mut self, name: &str, mtime: u64, mode: u32, data: &[u8]) -> io::Result<()> {
    let mut reader = data;
    self.append(name, mtime, mode, data.len() as u64, &mut reader)
  }

  pub fn into_inner(self) -> W {
    self.inner
  }
}

/// Reject values wider than their fixed-width header field.
fn fit_field(field: &str, value: String, width: usize) -> io::Result<String> {
  if value.len() > width {
    return Err(io::Error::new(
      io::ErrorKind::InvalidInput,
      format!("ar {} {} does not fit in {} characters", field, value, width),
    ));
  }
  Ok(value)
}
