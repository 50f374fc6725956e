use super::lock::StateLock;
use crate::error::{AlertError, Result};
use crate::models::OccurrenceState;
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSON file holding first-occurrence history between runs
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Lock guarding a load/modify/save cycle against overlapping runs
    pub fn lock(&self) -> Result<StateLock> {
        StateLock::acquire(&self.lock_path())
    }

    /// Read persisted state. `Ok(None)` when nothing has been saved yet.
    pub fn try_load(&self) -> Result<Option<OccurrenceState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            AlertError::StateIo(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let state = serde_json::from_str(&content).map_err(|e| {
            AlertError::StateIo(format!("corrupt state file {}: {}", self.path.display(), e))
        })?;
        Ok(Some(state))
    }

    /// Read persisted state, falling back to empty state.
    ///
    /// Unreadable state only risks a duplicate alert, so it is reported
    /// loudly and the unreadable file is copied aside before the next save
    /// replaces it.
    pub fn load(&self) -> OccurrenceState {
        self.load_or_empty(true)
    }

    /// Like [`StateStore::load`] but never touches the filesystem; used by dry runs.
    pub fn peek(&self) -> OccurrenceState {
        self.load_or_empty(false)
    }

    fn load_or_empty(&self, back_up_unreadable: bool) -> OccurrenceState {
        match self.try_load() {
            Ok(Some(state)) => {
                tracing::debug!(path = %self.path.display(), entries = state.len(), "Loaded state");
                state
            }
            Ok(None) => {
                tracing::info!(path = %self.path.display(), "No state file yet, starting fresh");
                OccurrenceState::default()
            }
            Err(e) => {
                tracing::warn!("{} - continuing with empty state; duplicate alerts are possible", e);
                if back_up_unreadable {
                    let backup = self.backup_path();
                    match std::fs::copy(&self.path, &backup) {
                        Ok(_) => tracing::warn!(backup = %backup.display(), "Copied unreadable state file aside"),
                        Err(copy_err) => tracing::warn!("Could not back up unreadable state: {}", copy_err),
                    }
                }
                OccurrenceState::default()
            }
        }
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    /// Write state atomically: temp file in the same directory, fsync, rename.
    ///
    /// A crash at any point leaves either the previous file or the new one.
    pub fn save(&self, state: &OccurrenceState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(state)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| {
            AlertError::StateIo(format!("cannot create temp file in {}: {}", dir.display(), e))
        })?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| {
            AlertError::StateIo(format!("cannot replace {}: {}", self.path.display(), e.error))
        })?;

        tracing::debug!(path = %self.path.display(), entries = state.len(), "Saved state");
        Ok(())
    }
}
