//! Scoped change of the process working directory.

use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Restores the previous working directory when restored explicitly or
/// dropped. Child processes inherit the directory while the guard is alive.
#[derive(Debug)]
pub struct WorkdirGuard {
    previous: PathBuf,
    restored: bool,
}

impl WorkdirGuard {
    /// Change into `dir`, which may be relative to the current directory.
    pub fn enter(dir: &Path) -> Result<Self> {
        let previous = std::env::current_dir().map_err(|source| Error::Directory {
            path: PathBuf::from("."),
            source,
        })?;
        std::env::set_current_dir(dir).map_err(|source| Error::Directory {
            path: previous.join(dir),
            source,
        })?;
        debug!(from = %previous.display(), to = %dir.display(), "changed directory");
        Ok(Self {
            previous,
            restored: false,
        })
    }

    /// Return to the saved directory, reporting failure.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        std::env::set_current_dir(&self.previous).map_err(|source| Error::Directory {
            path: self.previous.clone(),
            source,
        })
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            error!(path = %self.previous.display(), error = %e, "failed to restore working directory");
        }
    }
}

/// Serializes tests that touch the process-wide working directory.
#[cfg(test)]
pub(crate) static CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
