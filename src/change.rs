//! Modification tracking for the source store.
//!
//! The source is a database file that may carry a write-ahead-log sidecar
//! (`<file>-wal`). Writes can land in either, so the newest of the two
//! modification times is what gets compared against the last observation.

use std::{
   ffi::OsString,
   fs, io,
   path::{Path, PathBuf},
   time::SystemTime,
};

use parking_lot::Mutex;

use crate::{Result, error::Error};

/// Reports whether the source store has been written since the last check.
pub struct ChangeDetector {
   path:      PathBuf,
   wal_path:  PathBuf,
   last_seen: Mutex<SystemTime>,
}

impl ChangeDetector {
   pub fn new(path: impl Into<PathBuf>) -> Self {
      let path = path.into();
      let wal_path = wal_sidecar(&path);
      Self { path, wal_path, last_seen: Mutex::new(SystemTime::UNIX_EPOCH) }
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Returns `true` when the newest modification time of the store or its
   /// sidecar is later than anything observed before, and records it.
   ///
   /// A missing or unreadable store file is fatal; a missing sidecar is not.
   pub fn has_changed(&self) -> Result<bool> {
      let primary = modified(&self.path).map_err(|source| Error::SourceUnavailable {
         path: self.path.clone(),
         source,
      })?;

      let newest = match modified(&self.wal_path) {
         Ok(wal) => primary.max(wal),
         Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
               tracing::debug!("ignoring unreadable sidecar {}: {e}", self.wal_path.display());
            }
            primary
         },
      };

      let mut last_seen = self.last_seen.lock();
      if newest > *last_seen {
         *last_seen = newest;
         Ok(true)
      } else {
         Ok(false)
      }
   }

   pub fn last_seen(&self) -> SystemTime {
      *self.last_seen.lock()
   }
}

fn modified(path: &Path) -> io::Result<SystemTime> {
   fs::metadata(path)?.modified()
}

fn wal_sidecar(path: &Path) -> PathBuf {
   let mut name = OsString::from(path.as_os_str());
   name.push("-wal");
   PathBuf::from(name)
}
