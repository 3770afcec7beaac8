//! Advisory per-date planning locks.
//!
//! [`PlanningLocks`] covers runs inside one process. [`LockFile`] covers
//! separate processes sharing on-disk data.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use jiff::civil::Date;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::PlanError;

/// Dates with a planning run in flight. A second run for the same date is
/// rejected rather than queued.
#[derive(Debug, Default)]
pub struct PlanningLocks {
    active: Mutex<HashSet<Date>>,
}

impl PlanningLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, date: Date) -> Result<PlanningGuard<'_>, PlanError> {
        let mut active = self.active.lock();
        if !active.insert(date) {
            return Err(PlanError::ConcurrentPlanning(date));
        }
        debug!(%date, "acquired planning lock");
        Ok(PlanningGuard { locks: self, date })
    }

    pub fn is_locked(&self, date: Date) -> bool {
        self.active.lock().contains(&date)
    }
}

/// Releases the date when dropped.
#[derive(Debug)]
pub struct PlanningGuard<'a> {
    locks: &'a PlanningLocks,
    date: Date,
}

impl PlanningGuard<'_> {
    pub fn date(&self) -> Date {
        self.date
    }
}

impl Drop for PlanningGuard<'_> {
    fn drop(&mut self) {
        self.locks.active.lock().remove(&self.date);
        debug!(date = %self.date, "released planning lock");
    }
}

/// An exclusively created file that stands for a held lock.
///
/// Whoever creates the file holds the lock until the guard drops and removes
/// it. A process that dies while holding it leaves the file behind; delete it
/// by hand once no run is active.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Returns `Ok(None)` when the file already exists.
    pub fn try_acquire(path: impl Into<PathBuf>) -> io::Result<Option<Self>> {
        let path = path.into();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(err) => return Err(err),
        };
        let lock = Self { path };
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %lock.path.display(), "acquired lock file");
        Ok(Some(lock))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released lock file"),
            Err(err) => warn!(path = %self.path.display(), %err, "failed to remove lock file"),
        }
    }
}
