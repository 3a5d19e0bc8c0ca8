//! Committing the changes artifact and the release history together.
//!
//! Both files are fully staged and synced before either is renamed into
//! place. The changes artifact is committed first, then the history. If the
//! second rename fails the changes file is already in place and the history
//! is stale; that case is reported as `ChangesStepError::CommitHistory`.

use tracing::{debug, error};

use super::ChangesStepError;
use crate::util::staging::StagedFile;

pub fn commit_pair(changes: StagedFile, history: StagedFile) -> Result<(), ChangesStepError> {
  let changes_path = changes.target().to_path_buf();
  let history_path = history.target().to_path_buf();

  for staged in [&changes, &history] {
    staged.sync().map_err(|source| ChangesStepError::Stage {
      path: staged.target().to_path_buf(),
      source,
    })?;
  }

  changes.commit().map_err(|source| ChangesStepError::CommitChanges {
    path: changes_path.clone(),
    source,
  })?;
  debug!(path = %changes_path.display(), "changes file committed");

  history.commit().map_err(|source| {
    error!(
      changes = %changes_path.display(),
      history = %history_path.display(),
      "changes file written but release history is stale"
    );
    ChangesStepError::CommitHistory {
      path: history_path.clone(),
      changes_path: changes_path.clone(),
      source,
    }
  })?;
  debug!(path = %history_path.display(), "release history committed");

  Ok(())
}
