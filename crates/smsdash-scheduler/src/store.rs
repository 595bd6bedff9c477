//! File-based schedule store.
//!
//! One durable slot per fixed key, each a JSON file in the data directory.
//! Every save rewrites the whole collection; there are no partial writes.
//! Single writer only: an open store holds an exclusive lock on the
//! directory, and a second `open` on the same directory fails with
//! [`SmsDashError::Locked`].

use smsdash_core::error::{Result, SmsDashError};
use smsdash_core::types::{ScheduledMessage, ViewMode};
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key of the slot holding the scheduled-message array.
pub const SCHEDULES_KEY: &str = "scheduledMessages";
/// Key of the slot holding the list/grid preference.
pub const VIEW_MODE_KEY: &str = "scheduleViewMode";

const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone)]
pub struct ScheduleStore {
    dir: PathBuf,
    /// Released when the last clone is dropped.
    _lock: Arc<File>,
}

impl ScheduleStore {
    /// Open a store rooted at `dir`, creating the directory and taking
    /// the writer lock.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        match lock.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(SmsDashError::Locked(dir.display().to_string()));
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: Arc::new(lock),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load all scheduled messages. A missing slot is an empty list.
    pub fn load(&self) -> Result<Vec<ScheduledMessage>> {
        let file = self.slot(SCHEDULES_KEY);
        if !file.exists() {
            return Ok(Vec::new());
        }
        let json = std::fs::read_to_string(&file)?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        let messages: Vec<ScheduledMessage> = serde_json::from_str(&json)?;
        Ok(messages)
    }

    /// Replace the whole persisted collection.
    pub fn save_all(&self, messages: &[ScheduledMessage]) -> Result<()> {
        let json = serde_json::to_string_pretty(messages)?;
        self.write_slot(SCHEDULES_KEY, &json)?;
        tracing::debug!("💾 Saved {} scheduled messages", messages.len());
        Ok(())
    }

    /// Load the view preference. Missing or unreadable values mean `list`.
    pub fn load_view_mode(&self) -> ViewMode {
        let file = self.slot(VIEW_MODE_KEY);
        let Ok(raw) = std::fs::read_to_string(&file) else {
            return ViewMode::default();
        };
        match serde_json::from_str::<ViewMode>(&raw) {
            Ok(mode) => mode,
            Err(e) => {
                tracing::warn!("⚠️ Ignoring bad view mode in {}: {e}", file.display());
                ViewMode::default()
            }
        }
    }

    pub fn save_view_mode(&self, mode: ViewMode) -> Result<()> {
        let json = serde_json::to_string(&mode)?;
        self.write_slot(VIEW_MODE_KEY, &json)
    }

    /// Write to a sibling temp file, then rename over the slot.
    fn write_slot(&self, key: &str, contents: &str) -> Result<()> {
        let target = self.slot(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &target)?;
        Ok(())
    }
}
