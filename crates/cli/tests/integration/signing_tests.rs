//! Keygen, signed builds and verify.

use predicates::prelude::*;

use super::common::TestEnv;

fn keygen(env: &TestEnv, id: &str, passphrase: Option<&str>) {
  let mut cmd = env.debforge_cmd();
  cmd.args(["keygen", "--keyring", "keys/keyring.json", "--key", id]);
  if let Some(passphrase) = passphrase {
    cmd.env("DEBFORGE_PASSPHRASE", passphrase);
  }
  cmd
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("Generated key '{}'", id)));
}

#[test]
fn keygen_creates_keyring() {
  let env = TestEnv::new();
  keygen(&env, "release", None);

  let keyring: serde_json::Value = serde_json::from_str(&env.read_file("keys/keyring.json")).unwrap();
  assert_eq!(keyring["version"], 1);
  assert_eq!(keyring["keys"][0]["id"], "release");
  assert_eq!(keyring["keys"][0]["protection"], "plain");
}

#[test]
fn keygen_rejects_duplicate_id() {
  let env = TestEnv::new();
  keygen(&env, "release", None);

  env
    .debforge_cmd()
    .args(["keygen", "--keyring", "keys/keyring.json", "--key", "release"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));
}

#[test]
fn signed_build_verifies() {
  let env = TestEnv::new();
  keygen(&env, "release", Some("open sesame"));

  env
    .build_cmd()
    .args([
      "--changes-in",
      "hist.txt",
      "--changes-out",
      "hello.changes",
      "--keyring",
      "keys/keyring.json",
      "--key",
      "release",
    ])
    .env("DEBFORGE_PASSPHRASE", "open sesame")
    .assert()
    .success()
    .stdout(predicate::str::contains("Signed: yes"));

  env
    .debforge_cmd()
    .args(["verify", "hello.changes", "--keyring", "keys/keyring.json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Good signature from key 'release'"));
}

#[test]
fn wrong_passphrase_fails_quietly() {
  let env = TestEnv::new();
  keygen(&env, "release", Some("open sesame"));

  env
    .build_cmd()
    .args(["--changes-in", "hist.txt", "--changes-out", "hello.changes"])
    .args(["--keyring", "keys/keyring.json", "--passphrase", "hunter2"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("wrong passphrase"))
    .stderr(predicate::str::contains("hunter2").not())
    .stdout(predicate::str::contains("hunter2").not());

  assert!(!env.path("hello.changes").exists());
}

#[test]
fn tampered_changes_fail_verification() {
  let env = TestEnv::new();
  keygen(&env, "release", None);

  env
    .build_cmd()
    .args(["--changes-in", "hist.txt", "--changes-out", "hello.changes"])
    .args(["--keyring", "keys/keyring.json"])
    .assert()
    .success();

  let tampered = env.read_file("hello.changes").replace("Version: 1.2.3", "Version: 9.9.9");
  env.write_file("hello.changes", &tampered);

  env
    .debforge_cmd()
    .args(["verify", "hello.changes"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Verification failed"));
}

#[test]
fn verify_rejects_unsigned_file() {
  let env = TestEnv::new();

  env
    .build_cmd()
    .args(["--changes-in", "hist.txt", "--changes-out", "hello.changes"])
    .assert()
    .success();

  env
    .debforge_cmd()
    .args(["verify", "hello.changes"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("is not signed"));
}
