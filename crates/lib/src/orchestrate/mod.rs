//! Build orchestration.
//!
//! One run goes through these states:
//!
//! ```text
//! Start -> Validated -> PackageBuilt -> [ChangesBuilt -> HistoryPersisted] -> Done
//! ```
//!
//! The bracketed states only happen when a changes record was requested.
//! Nothing after a failed phase runs. Every phase outcome, success or
//! failure, is reported through the `MessageSink` exactly once.

pub mod commit;

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::changes::{ChangesEngine, ChangesError, SigningRequest, TextChangesEngine};
use crate::config::BuildConfig;
use crate::package::{BuildDescriptor, ControlFileSet, DebPackager, PackageError, PackagingEngine};
use crate::sink::MessageSink;
use crate::util::staging::{StagedFile, parent_dir};
use crate::validate::{ConfigError, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
  Start,
  Validated,
  PackageBuilt,
  ChangesBuilt,
  HistoryPersisted,
  Done,
}

#[derive(Debug, Error)]
pub enum ChangesStepError {
  #[error("failed to open release history {path}: {source}")]
  OpenHistory {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to open keyring {path}: {source}")]
  OpenKeyring {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to stage {path}: {source}")]
  Stage {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Engine(#[from] ChangesError),

  #[error("failed to write changes file {path}: {source}")]
  CommitChanges {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("changes file {changes_path} was written but release history {path} could not be updated: {source}")]
  CommitHistory {
    path: PathBuf,
    changes_path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),

  #[error("failed to create package {destination}: {source}")]
  Package {
    destination: PathBuf,
    #[source]
    source: PackageError,
  },

  #[error("failed to create changes file {path}: {source}")]
  Changes {
    path: PathBuf,
    /// The package was built before the changes step failed.
    descriptor: Box<BuildDescriptor>,
    state: BuildState,
    #[source]
    source: ChangesStepError,
  },
}

impl BuildError {
  /// The last state the run reached before failing.
  pub fn state(&self) -> BuildState {
    match self {
      BuildError::Config(_) => BuildState::Start,
      BuildError::Package { .. } => BuildState::Validated,
      BuildError::Changes { state, .. } => *state,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangesReport {
  pub path: PathBuf,
  pub history_path: PathBuf,
  pub signed: bool,
  pub release_version: String,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
  pub descriptor: BuildDescriptor,
  pub changes: Option<ChangesReport>,
  pub state: BuildState,
}

/// Drives validation, the packaging engine and the changes engine.
#[derive(Debug, Clone)]
pub struct BuildOrchestrator<P = DebPackager, C = TextChangesEngine> {
  packager: P,
  changes: C,
}

impl BuildOrchestrator {
  pub fn new() -> Self {
    Self::with_engines(DebPackager::new(), TextChangesEngine::new())
  }
}

impl Default for BuildOrchestrator {
  fn default() -> Self {
    Self::new()
  }
}

impl<P: PackagingEngine, C: ChangesEngine> BuildOrchestrator<P, C> {
  pub fn with_engines(packager: P, changes: C) -> Self {
    Self { packager, changes }
  }

  pub fn engines(&self) -> (&P, &C) {
    (&self.packager, &self.changes)
  }

  pub fn run(&self, config: &BuildConfig, sink: &dyn MessageSink) -> Result<BuildReport, BuildError> {
    let result = self.execute(config, sink);
    if let Err(err) = &result {
      error!(state = ?err.state(), "{}", err);
      sink.report(&err.to_string());
    }
    result
  }

  fn execute(&self, config: &BuildConfig, sink: &dyn MessageSink) -> Result<BuildReport, BuildError> {
    let paths = validate(config)?;
    info!(destination = %paths.destination.display(), "building package");

    let descriptor = ControlFileSet::scan(paths.control)
      .and_then(|control| self.packager.build(&control, config.producers(), paths.destination))
      .map_err(|source| BuildError::Package {
        destination: paths.destination.to_path_buf(),
        source,
      })?;
    sink.report(&format!("created package {}", paths.destination.display()));

    let Some((changes_in, changes_out)) = paths.changes else {
      return Ok(BuildReport {
        descriptor,
        changes: None,
        state: BuildState::Done,
      });
    };

    let mut state = BuildState::PackageBuilt;
    match self.build_changes(config, &descriptor, changes_in, changes_out, &mut state) {
      Ok(changes) => {
        sink.report(&format!("created changes file {}", changes_out.display()));
        Ok(BuildReport {
          descriptor,
          changes: Some(changes),
          state: BuildState::Done,
        })
      }
      Err(source) => Err(BuildError::Changes {
        path: changes_out.to_path_buf(),
        descriptor: Box::new(descriptor),
        state,
        source,
      }),
    }
  }

  fn build_changes(
    &self,
    config: &BuildConfig,
    descriptor: &BuildDescriptor,
    history_path: &Path,
    changes_path: &Path,
    state: &mut BuildState,
  ) -> Result<ChangesReport, ChangesStepError> {
    let stage_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source| ChangesStepError::Stage { path, source }
    };

    let mut history = {
      let mut file = File::open(history_path).map_err(|source| ChangesStepError::OpenHistory {
        path: history_path.to_path_buf(),
        source,
      })?;
      self.changes.read_history(&mut file)?
    };

    let mut keyring = config
      .keyring()
      .map(|path| {
        File::open(path).map_err(|source| ChangesStepError::OpenKeyring {
          path: path.to_path_buf(),
          source,
        })
      })
      .transpose()?;
    let signed = keyring.is_some();

    fs::create_dir_all(parent_dir(changes_path)).map_err(stage_err(changes_path))?;
    let mut staged_changes = StagedFile::new(changes_path).map_err(stage_err(changes_path))?;
    {
      let mut writer = BufWriter::new(staged_changes.file_mut());
      let signing = SigningRequest {
        keyring: keyring.as_mut().map(|file| file as &mut dyn Read),
        key_id: config.key_id(),
        passphrase: config.passphrase(),
      };
      self.changes.build_signed(descriptor, &mut history, signing, &mut writer)?;
      writer.flush().map_err(stage_err(changes_path))?;
    }
    drop(keyring);
    *state = BuildState::ChangesBuilt;

    let mut staged_history = StagedFile::new(history_path).map_err(stage_err(history_path))?;
    {
      let mut writer = BufWriter::new(staged_history.file_mut());
      self.changes.persist_history(&history, &mut writer)?;
      writer.flush().map_err(stage_err(history_path))?;
    }

    commit::commit_pair(staged_changes, staged_history)?;
    *state = BuildState::HistoryPersisted;

    let release_version = history
      .latest()
      .map(|entry| entry.version.clone())
      .unwrap_or_else(|| descriptor.version.clone());
    info!(
      changes = %changes_path.display(),
      history = %history_path.display(),
      version = %release_version,
      signed,
      "changes recorded"
    );

    Ok(ChangesReport {
      path: changes_path.to_path_buf(),
      history_path: history_path.to_path_buf(),
      signed,
      release_version,
    })
  }
}
