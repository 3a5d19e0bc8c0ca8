//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub const CONTROL: &str = "\
Package: hello
Version: 1.2.3
Architecture: amd64
Maintainer: Jane Doe <jane@example.org>
Description: greets the world
";

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding a control directory,
/// a data directory and an empty release history.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file("control/control", CONTROL);
    env.write_file("control/postinst", "#!/bin/sh\nexit 0\n");
    env.write_file("data/usr/bin/hello", "#!/bin/sh\necho hello\n");
    env.write_file("data/etc/hello.conf", "greeting=hi\n");
    env.write_file("hist.txt", "");
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.path(relative_path)).unwrap()
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.temp.path().join(relative_path)
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// A debforge command running inside the temp directory, with no signing
  /// settings inherited from the environment.
  pub fn debforge_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("debforge");
    cmd.current_dir(self.root());
    cmd.env_remove("DEBFORGE_KEYRING");
    cmd.env_remove("DEBFORGE_KEY");
    cmd.env_remove("DEBFORGE_PASSPHRASE");
    cmd
  }

  /// `debforge build` with control, destfile and data already set.
  pub fn build_cmd(&self) -> Command {
    let mut cmd = self.debforge_cmd();
    cmd.args(["build", "--control", "control", "--destfile", "dist/hello.deb", "--data", "data"]);
    cmd
  }
}
