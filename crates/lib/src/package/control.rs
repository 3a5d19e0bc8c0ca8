//! Control file parsing and rendering.
//!
//! Control files use the deb822 layout:
//!
//! ```text
//! Package: hello
//! Version: 1.2.3
//! Description: greets the world
//!  Continuation lines start with whitespace.
//! ```
//!
//! Field names compare case-insensitively. Field order is preserved so the
//! emitted control file matches the author's.

use super::PackageError;

/// Fields that must be present in `control`.
pub const REQUIRED_FIELDS: &[&str] = &["Package", "Version", "Maintainer", "Description"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFields {
  fields: Vec<(String, String)>,
}

impl ControlFields {
  pub fn parse(text: &str) -> Result<Self, PackageError> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
      let line_no = idx + 1;
      if line.trim().is_empty() || line.starts_with('#') {
        continue;
      }

      if line.starts_with(' ') || line.starts_with('\t') {
        let Some((_, value)) = fields.last_mut() else {
          return Err(PackageError::MalformedControl(format!(
            "line {}: continuation line before any field",
            line_no
          )));
        };
        value.push('\n');
        value.push_str(line.trim_end());
        continue;
      }

      let Some((name, value)) = line.split_once(':') else {
        return Err(PackageError::MalformedControl(format!(
          "line {}: expected 'Field: value', got {:?}",
          line_no, line
        )));
      };
      let name = name.trim();
      if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(PackageError::MalformedControl(format!(
          "line {}: invalid field name {:?}",
          line_no, name
        )));
      }
      fields.push((name.to_string(), value.trim().to_string()));
    }

    Ok(Self { fields })
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .fields
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }

  /// Replace the value of `name`, or append the field if missing.
  pub fn set(&mut self, name: &str, value: impl Into<String>) {
    let value = value.into();
    match self.fields.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
      Some((_, existing)) => *existing = value,
      None => self.fields.push((name.to_string(), value)),
    }
  }

  /// Check the fields a package cannot be built without.
  pub fn check(&self) -> Result<(), PackageError> {
    for field in REQUIRED_FIELDS {
      match self.get(field) {
        Some(value) if !value.trim().is_empty() => {}
        _ => {
          return Err(PackageError::MalformedControl(format!(
            "missing required field '{}'",
            field
          )));
        }
      }
    }

    let package = self.get("Package").unwrap_or_default();
    if !is_valid_package_name(package) {
      return Err(PackageError::MalformedControl(format!(
        "invalid package name {:?}: use lowercase letters, digits, '+', '-' and '.'",
        package
      )));
    }

    Ok(())
  }

  pub fn fields(&self) -> &[(String, String)] {
    &self.fields
  }

  pub fn render(&self) -> String {
    let mut out = String::new();
    for (name, value) in &self.fields {
      out.push_str(name);
      out.push(':');
      if !value.is_empty() && !value.starts_with('\n') {
        out.push(' ');
      }
      out.push_str(value);
      out.push('\n');
    }
    out
  }
}

fn is_valid_package_name(name: &str) -> bool {
  let mut chars = name.chars();
  let Some(first) = chars.next() else {
    return false;
  };
  name.len() >= 2
    && (first.is_ascii_lowercase() || first.is_ascii_digit())
    && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
}
