//! Per-slot advisory locking (spec.md §4.3; `lock.c`'s `dcc_lock_host`).
//!
//! Lock ordering discipline (must be enforced by callers, not by this
//! type): a process holds at most one remote lock and one local lock at
//! a time; the remote lock is acquired first and released last.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::trace;

use distcc_core::HostDef;

use crate::error::LockError;
use crate::filename::lock_filename;

pub struct SlotLock {
    file: std::fs::File,
    path: PathBuf,
}

impl SlotLock {
    /// Attempts to acquire `purpose`'s lock for `slot` on `host`, under
    /// `lock_dir`. Non-blocking: returns `Err(LockError::Busy)`
    /// immediately if another process holds it.
    pub fn try_acquire(
        lock_dir: &Path,
        purpose: &str,
        host: &HostDef,
        slot: u32,
    ) -> Result<Self, LockError> {
        Self::open_and_lock(lock_dir, purpose, host, slot, false)
    }

    /// Blocks until the lock is free.
    pub fn acquire_blocking(
        lock_dir: &Path,
        purpose: &str,
        host: &HostDef,
        slot: u32,
    ) -> Result<Self, LockError> {
        Self::open_and_lock(lock_dir, purpose, host, slot, true)
    }

    fn open_and_lock(
        lock_dir: &Path,
        purpose: &str,
        host: &HostDef,
        slot: u32,
        block: bool,
    ) -> Result<Self, LockError> {
        std::fs::create_dir_all(lock_dir).map_err(|source| LockError::Io {
            path: lock_dir.to_path_buf(),
            source,
        })?;
        let path = lock_filename(lock_dir, purpose, host, slot);

        // The file's existence carries no meaning; only the held lock
        // does, so permissions are left at the loosest the umask allows.
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        let lock_result = if block {
            file.lock_exclusive()
        } else {
            file.try_lock_exclusive()
        };

        match lock_result {
            Ok(()) => {
                trace!(path = %path.display(), "acquired slot lock");
                Ok(SlotLock { file, path })
            }
            Err(e) if !block && is_lock_contended(&e) => Err(LockError::Busy),
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Explicit unlock-then-close, mirroring `dcc_unlock`. Dropping the
    /// lock without calling this still releases it: the OS releases
    /// `fcntl`/`flock` locks when the last fd referencing them closes.
    pub fn release(self) -> Result<(), LockError> {
        let path = self.path.clone();
        self.file.unlock().map_err(|source| LockError::Io { path, source })
    }
}

fn is_lock_contended(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::PermissionDenied
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use distcc_core::model::{CppWhere, Mode, Protocol};

    fn local_host() -> HostDef {
        HostDef {
            mode: Mode::Local,
            hostdef_string: "localhost".into(),
            is_up: true,
            n_slots: 2,
            n_cpp_slots: 2,
            protocol: Protocol::V1,
            compressed: false,
            cpp_where: CppWhere::Client,
        }
    }

    #[test]
    fn second_nonblocking_acquire_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let host = local_host();
        let _first = SlotLock::try_acquire(dir.path(), "cpu", &host, 0).unwrap();
        let second = SlotLock::try_acquire(dir.path(), "cpu", &host, 0);
        assert!(matches!(second, Err(LockError::Busy)));
    }

    #[test]
    fn different_slots_do_not_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let host = local_host();
        let _a = SlotLock::try_acquire(dir.path(), "cpu", &host, 0).unwrap();
        let _b = SlotLock::try_acquire(dir.path(), "cpu", &host, 1).unwrap();
    }

    #[test]
    fn release_allows_reacquisition() {
        let dir = tempfile::tempdir().unwrap();
        let host = local_host();
        let lock = SlotLock::try_acquire(dir.path(), "cpu", &host, 0).unwrap();
        lock.release().unwrap();
        let _again = SlotLock::try_acquire(dir.path(), "cpu", &host, 0).unwrap();
    }
}
