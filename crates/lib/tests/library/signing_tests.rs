//! Signed changes through the orchestrator.

use debforge_lib::orchestrate::ChangesStepError;
use debforge_lib::signing::{Keyring, SigningError, verify_signed_changes};
use debforge_lib::{BuildError, BuildOrchestrator, BuildState, MemorySink, Passphrase};

use super::common::Fixture;

fn keyring_at(fx: &Fixture, ids: &[&str], passphrase: Option<&str>) -> Keyring {
  let passphrase = passphrase.map(Passphrase::new);
  let mut keyring = Keyring::new();
  for id in ids {
    keyring.generate(id, passphrase.as_ref()).unwrap();
  }
  keyring.save(&fx.path("keyring.json")).unwrap();
  keyring
}

fn signing_error(err: &BuildError) -> &SigningError {
  match err {
    BuildError::Changes {
      source: ChangesStepError::Engine(debforge_lib::changes::ChangesError::Signing(e)),
      ..
    } => e,
    other => panic!("expected a signing failure, got {other:?}"),
  }
}

#[test]
fn signed_changes_verify_against_keyring() {
  let fx = Fixture::new();
  let keyring = keyring_at(&fx, &["release"], Some("open sesame"));
  let config = fx
    .changes_config()
    .with_keyring(fx.path("keyring.json"))
    .with_key_id("release")
    .with_passphrase("open sesame");

  let report = BuildOrchestrator::new().run(&config, &MemorySink::new()).unwrap();

  assert!(report.changes.unwrap().signed);
  let verified = verify_signed_changes(&fx.read("out.changes"), Some(&keyring)).unwrap();
  assert_eq!(verified.key_id, "release");
  assert!(verified.body.contains("Binary: hello\n"));
}

#[test]
fn single_key_is_selected_without_id() {
  let fx = Fixture::new();
  keyring_at(&fx, &["only"], None);
  let config = fx.changes_config().with_keyring(fx.path("keyring.json"));

  BuildOrchestrator::new().run(&config, &MemorySink::new()).unwrap();

  let verified = verify_signed_changes(&fx.read("out.changes"), None).unwrap();
  assert_eq!(verified.key_id, "only");
}

#[test]
fn ambiguous_key_fails_without_writing() {
  let fx = Fixture::new();
  keyring_at(&fx, &["a", "b"], None);
  let config = fx.changes_config().with_keyring(fx.path("keyring.json"));

  let err = BuildOrchestrator::new().run(&config, &MemorySink::new()).unwrap_err();

  assert!(matches!(signing_error(&err), SigningError::AmbiguousKey(2)));
  assert_eq!(err.state(), BuildState::PackageBuilt);
  assert!(!fx.path("out.changes").exists());
  assert_eq!(fx.read("hist.txt"), "");
}

#[test]
fn wrong_passphrase_is_not_echoed() {
  let fx = Fixture::new();
  keyring_at(&fx, &["release"], Some("open sesame"));
  let sink = MemorySink::new();
  let config = fx
    .changes_config()
    .with_keyring(fx.path("keyring.json"))
    .with_passphrase("hunter2");

  let err = BuildOrchestrator::new().run(&config, &sink).unwrap_err();

  assert!(matches!(signing_error(&err), SigningError::BadPassphrase(_)));
  assert!(!format!("{err:?}").contains("hunter2"));
  for message in sink.messages() {
    assert!(!message.contains("hunter2"));
  }
  assert!(!fx.path("out.changes").exists());
}

#[test]
fn unsigned_when_no_keyring() {
  let fx = Fixture::new();
  let config = fx.changes_config().with_key_id("release");

  let report = BuildOrchestrator::new().run(&config, &MemorySink::new()).unwrap();

  assert!(!report.changes.unwrap().signed);
  assert!(fx.read("out.changes").starts_with("Format: "));
}
