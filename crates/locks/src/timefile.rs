//! Backoff timefiles (spec.md §4.3; `backoff.c`/`timefile.c`): a file
//! whose mtime records the last time a host was disliked.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::trace;

use distcc_core::HostDef;

use crate::error::LockError;
use crate::filename::timefile_name;

pub const DEFAULT_BACKOFF_SECS: u64 = 60;

/// Sets `host`'s timefile mtime to now, mirroring `dcc_mark_timefile`'s
/// "open and write one byte" approach — the write, not a truncate, is
/// what bumps mtime.
pub fn mark(state_dir: &Path, kind: &str, host: &HostDef) -> Result<(), LockError> {
    std::fs::create_dir_all(state_dir).map_err(|source| LockError::Io {
        path: state_dir.to_path_buf(),
        source,
    })?;
    let path = timefile_name(state_dir, kind, host);
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .open(&path)
        .map_err(|source| LockError::Io {
            path: path.clone(),
            source,
        })?;
    file.write_all(b"\0").map_err(|source| LockError::Io { path, source })?;
    Ok(())
}

/// Returns the timefile's mtime, or `None` if it doesn't exist.
pub fn check(state_dir: &Path, kind: &str, host: &HostDef) -> Result<Option<SystemTime>, LockError> {
    let path = timefile_name(state_dir, kind, host);
    match std::fs::metadata(&path) {
        Ok(meta) => Ok(Some(meta.modified().map_err(|source| LockError::Io {
            path,
            source,
        })?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LockError::Io { path, source }),
    }
}

pub fn remove(state_dir: &Path, kind: &str, host: &HostDef) -> Result<(), LockError> {
    let path = timefile_name(state_dir, kind, host);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LockError::Io { path, source }),
    }
}

/// `true` iff `host` is still within its backoff window.
pub fn is_backed_off(state_dir: &Path, host: &HostDef, backoff_secs: u64) -> Result<bool, LockError> {
    if backoff_secs == 0 {
        return Ok(false);
    }
    let Some(mtime) = check(state_dir, "backoff", host)? else {
        return Ok(false);
    };
    let elapsed = SystemTime::now()
        .duration_since(mtime)
        .unwrap_or(Duration::ZERO);
    let backed_off = elapsed < Duration::from_secs(backoff_secs);
    if backed_off {
        trace!(host = %host, "still within backoff window");
    }
    Ok(backed_off)
}

#[cfg(test)]
mod tests {
    use super::*;
    use distcc_core::model::{CppWhere, Mode, Protocol};

    fn host() -> HostDef {
        HostDef {
            mode: Mode::Tcp {
                hostname: "build01".into(),
                port: 3632,
            },
            hostdef_string: "build01".into(),
            is_up: true,
            n_slots: 4,
            n_cpp_slots: 4,
            protocol: Protocol::V1,
            compressed: false,
            cpp_where: CppWhere::Client,
        }
    }

    #[test]
    fn mark_then_check_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let h = host();
        assert!(check(dir.path(), "backoff", &h).unwrap().is_none());
        mark(dir.path(), "backoff", &h).unwrap();
        assert!(check(dir.path(), "backoff", &h).unwrap().is_some());
    }

    #[test]
    fn fresh_mark_is_backed_off() {
        let dir = tempfile::tempdir().unwrap();
        let h = host();
        mark(dir.path(), "backoff", &h).unwrap();
        assert!(is_backed_off(dir.path(), &h, DEFAULT_BACKOFF_SECS).unwrap());
    }

    #[test]
    fn zero_backoff_period_disables_check() {
        let dir = tempfile::tempdir().unwrap();
        let h = host();
        mark(dir.path(), "backoff", &h).unwrap();
        assert!(!is_backed_off(dir.path(), &h, 0).unwrap());
    }

    #[test]
    fn remove_clears_mark() {
        let dir = tempfile::tempdir().unwrap();
        let h = host();
        mark(dir.path(), "backoff", &h).unwrap();
        remove(dir.path(), "backoff", &h).unwrap();
        assert!(check(dir.path(), "backoff", &h).unwrap().is_none());
    }
}
