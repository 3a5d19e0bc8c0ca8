//! End-to-end runs of the build orchestrator.

use std::fs;

use debforge_lib::changes::{ChangesEngine, TextChangesEngine};
use debforge_lib::orchestrate::ChangesStepError;
use debforge_lib::package::DebPackager;
use debforge_lib::{BuildConfig, BuildError, BuildOrchestrator, BuildState, MemorySink};

use super::common::{CountingChanges, CountingPackager, FailingPackager, Fixture};

fn instrumented() -> BuildOrchestrator<CountingPackager, CountingChanges> {
  BuildOrchestrator::with_engines(CountingPackager::default(), CountingChanges::default())
}

mod validation {
  use super::*;

  #[test]
  fn missing_control_reports_and_writes_nothing() {
    let fx = Fixture::new();
    let before = fx.snapshot();
    let sink = MemorySink::new();
    let orchestrator = instrumented();

    let config = BuildConfig::new()
      .with_control(fx.path("no-such-dir"))
      .with_destination(fx.path("out.pkg"))
      .with_producer(debforge_lib::producer::DirectoryProducer::new(fx.path("data")));
    let err = orchestrator.run(&config, &sink).unwrap_err();

    assert!(matches!(err, BuildError::Config(_)));
    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("control"));
    assert_eq!(fx.snapshot(), before);
    assert_eq!(orchestrator_calls(&orchestrator), (0, 0));
  }

  #[test]
  fn missing_destination_writes_nothing() {
    let fx = Fixture::new();
    let before = fx.snapshot();
    let config = BuildConfig::new()
      .with_control(fx.path("control"))
      .with_producer(debforge_lib::producer::DirectoryProducer::new(fx.path("data")));

    let err = BuildOrchestrator::new().run(&config, &MemorySink::new()).unwrap_err();

    assert!(err.to_string().contains("destfile"));
    assert_eq!(fx.snapshot(), before);
  }

  #[test]
  fn missing_producers_writes_nothing() {
    let fx = Fixture::new();
    let before = fx.snapshot();
    let config = BuildConfig::new()
      .with_control(fx.path("control"))
      .with_destination(fx.path("out.pkg"));

    assert!(BuildOrchestrator::new().run(&config, &MemorySink::new()).is_err());
    assert_eq!(fx.snapshot(), before);
  }

  #[test]
  fn changes_out_without_changes_in_skips_packaging() {
    let fx = Fixture::new();
    let orchestrator = instrumented();
    let config = fx.package_config().with_changes_out(fx.path("out.changes"));

    let err = orchestrator.run(&config, &MemorySink::new()).unwrap_err();

    assert!(err.to_string().contains("changesIn"));
    assert!(!fx.path("out.pkg").exists());
    assert_eq!(orchestrator_calls(&orchestrator), (0, 0));
  }

  #[test]
  fn same_history_and_changes_path_rejected() {
    let fx = Fixture::new();
    let config = fx
      .package_config()
      .with_changes_in(fx.path("hist.txt"))
      .with_changes_out(fx.path("hist.txt"));

    let err = BuildOrchestrator::new().run(&config, &MemorySink::new()).unwrap_err();

    assert!(matches!(err, BuildError::Config(_)));
    assert!(!fx.path("out.pkg").exists());
  }

  #[test]
  fn package_over_history_rejected_and_history_kept() {
    let fx = Fixture::new();
    fx.write("hist.txt", " * keep me\n");
    let before = fx.snapshot();
    let orchestrator = instrumented();
    let config = fx
      .changes_config()
      .with_destination(fx.path("hist.txt"));

    let err = orchestrator.run(&config, &MemorySink::new()).unwrap_err();

    assert!(matches!(err, BuildError::Config(_)));
    assert!(err.to_string().contains("destfile"));
    assert_eq!(fx.read("hist.txt"), " * keep me\n");
    assert_eq!(fx.snapshot(), before);
    assert_eq!(orchestrator_calls(&orchestrator), (0, 0));
  }
}

fn orchestrator_calls(orchestrator: &BuildOrchestrator<CountingPackager, CountingChanges>) -> (usize, usize) {
  let (packager, changes) = orchestrator.engines();
  (packager.calls.get(), changes.calls.get())
}

mod package_only {
  use super::*;

  #[test]
  fn builds_package_and_reports_once() {
    let fx = Fixture::new();
    let sink = MemorySink::new();

    let report = BuildOrchestrator::new().run(&fx.package_config(), &sink).unwrap();

    assert!(fx.path("out.pkg").is_file());
    assert!(!fx.path("out.changes").exists());
    assert!(report.changes.is_none());
    assert_eq!(report.state, BuildState::Done);
    assert_eq!(sink.messages(), [format!("created package {}", fx.path("out.pkg").display())]);
  }

  #[test]
  fn descriptor_matches_control() {
    let fx = Fixture::new();

    let report = BuildOrchestrator::new().run(&fx.package_config(), &MemorySink::new()).unwrap();

    let descriptor = report.descriptor;
    assert_eq!(descriptor.package, "hello");
    assert_eq!(descriptor.version, "1.2.3");
    assert_eq!(descriptor.architecture, "amd64");
    assert_eq!(descriptor.maintainer, "Jane Doe <jane@example.org>");
    assert_eq!(descriptor.archive.file_name, "out.pkg");
    assert_eq!(descriptor.archive.size, fs::metadata(fx.path("out.pkg")).unwrap().len());
  }

  #[test]
  fn packaging_failure_never_reaches_changes_engine() {
    let fx = Fixture::new();
    let sink = MemorySink::new();
    let orchestrator = BuildOrchestrator::with_engines(FailingPackager, CountingChanges::default());

    let err = orchestrator.run(&fx.changes_config(), &sink).unwrap_err();

    assert!(matches!(err, BuildError::Package { .. }));
    assert_eq!(err.state(), BuildState::Validated);
    assert_eq!(orchestrator.engines().1.calls.get(), 0);
    assert!(!fx.path("out.changes").exists());
    assert_eq!(fx.read("hist.txt"), "");

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("injected failure"));
  }

  #[test]
  fn malformed_control_is_reported() {
    let fx = Fixture::new();
    fx.write("control/control", "Package: hello\n");
    let sink = MemorySink::new();

    let err = BuildOrchestrator::new().run(&fx.package_config(), &sink).unwrap_err();

    assert!(matches!(err, BuildError::Package { .. }));
    assert!(sink.messages()[0].contains("Version"));
    assert!(!fx.path("out.pkg").exists());
  }
}

mod with_changes {
  use super::*;

  #[test]
  fn writes_changes_and_updates_history() {
    let fx = Fixture::new();
    let sink = MemorySink::new();

    let report = BuildOrchestrator::new().run(&fx.changes_config(), &sink).unwrap();

    assert!(fx.path("out.pkg").is_file());
    let changes = fx.read("out.changes");
    assert!(changes.contains("Source: hello\n"));
    assert!(changes.contains("Version: 1.2.3\n"));
    assert!(changes.contains("out.pkg\n"));

    let history = TextChangesEngine::new()
      .read_history(&mut fs::File::open(fx.path("hist.txt")).unwrap())
      .unwrap();
    assert_eq!(history.entries().len(), 1);
    assert_eq!(history.entries()[0].version, "1.2.3");

    assert_eq!(report.changes.unwrap().release_version, "1.2.3");
    assert_eq!(sink.messages().len(), 2);
  }

  #[test]
  fn recorded_entry_appears_exactly_once() {
    let fx = Fixture::new();
    fx.write("hist.txt", " * first cut\nrelease version=1.0.0\n * initial\n");

    BuildOrchestrator::new().run(&fx.changes_config(), &MemorySink::new()).unwrap();

    let history = TextChangesEngine::new()
      .read_history(&mut fs::File::open(fx.path("hist.txt")).unwrap())
      .unwrap();
    let versions: Vec<_> = history.entries().iter().map(|e| e.version.as_str()).collect();
    assert_eq!(versions, ["1.2.3", "1.0.0"]);
    assert_eq!(history.entries()[0].changes, ["first cut"]);
    assert!(history.pending().is_empty());
  }

  #[test]
  fn history_failure_leaves_no_changes_file() {
    let fx = Fixture::new();
    fx.write("hist.txt", " * pending\n");
    let sink = MemorySink::new();
    let orchestrator = BuildOrchestrator::with_engines(DebPackager::new(), CountingChanges::failing_persist());

    let err = orchestrator.run(&fx.changes_config(), &sink).unwrap_err();

    assert_eq!(err.state(), BuildState::ChangesBuilt);
    assert!(matches!(
      err,
      BuildError::Changes {
        source: ChangesStepError::Engine(_),
        ..
      }
    ));
    assert!(fx.path("out.pkg").is_file());
    assert!(!fx.path("out.changes").exists());
    assert_eq!(fx.read("hist.txt"), " * pending\n");

    let messages = sink.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].contains("disk full"));
  }

  #[test]
  fn unreadable_history_is_reported() {
    let fx = Fixture::new();
    fx.write("hist.txt", "not a history line\n");
    let sink = MemorySink::new();

    let err = BuildOrchestrator::new().run(&fx.changes_config(), &sink).unwrap_err();

    assert_eq!(err.state(), BuildState::PackageBuilt);
    assert!(sink.messages()[1].contains("line 1"));
    assert!(!fx.path("out.changes").exists());
  }

  #[test]
  fn changes_directory_is_created() {
    let fx = Fixture::new();
    let config = fx
      .package_config()
      .with_changes_in(fx.path("hist.txt"))
      .with_changes_out(fx.path("dist/changes/out.changes"));

    BuildOrchestrator::new().run(&config, &MemorySink::new()).unwrap();

    assert!(fx.path("dist/changes/out.changes").is_file());
  }
}
