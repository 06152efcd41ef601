//! Unique temp path allocation: `<tmpdir>/<prefix>_<hex(pid|usec|sec)><suffix>`,
//! created with `O_WRONLY|O_CREAT|O_EXCL|0600`; bumps a nonce and
//! retries on `EEXIST`.

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::TempFileError;

const MAX_ATTEMPTS: u32 = 64;

fn candidate_name(prefix: &str, suffix: &str, nonce: u32) -> String {
    let pid = std::process::id();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let mixed = (u64::from(pid) << 32) ^ now.as_micros() as u64 ^ u64::from(nonce);
    format!("{prefix}_{mixed:x}{suffix}")
}

/// Creates a new, exclusively-owned file under `dir`. Returns the open
/// file and its path; the caller is responsible for registering the
/// path with a [`crate::TempRegistry`].
pub fn create_unique_file(
    dir: &Path,
    prefix: &str,
    suffix: &str,
) -> Result<(std::fs::File, PathBuf), TempFileError> {
    use std::os::unix::fs::OpenOptionsExt;

    for nonce in 0..MAX_ATTEMPTS {
        let path = dir.join(candidate_name(prefix, suffix, nonce));
        let result = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .custom_flags(libc::O_EXCL)
            .open(&path);
        match result {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(TempFileError::Io(e)),
        }
    }
    Err(TempFileError::ExhaustedAttempts)
}

/// Creates a new, exclusively-owned directory under `dir` (`mkdtemp`-style).
pub fn create_unique_dir(dir: &Path, prefix: &str) -> Result<PathBuf, TempFileError> {
    for nonce in 0..MAX_ATTEMPTS {
        let path = dir.join(candidate_name(prefix, "", nonce));
        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(TempFileError::Io(e)),
        }
    }
    Err(TempFileError::ExhaustedAttempts)
}

pub fn path_to_cstring(path: &Path) -> Result<CString, TempFileError> {
    CString::new(path.as_os_str().as_encoded_bytes().to_vec())
        .map_err(|_| TempFileError::InteriorNul(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let (_f1, p1) = create_unique_file(dir.path(), "distcc", ".i").unwrap();
        let (_f2, p2) = create_unique_file(dir.path(), "distcc", ".i").unwrap();
        assert_ne!(p1, p2);
        assert!(p1.to_str().unwrap().ends_with(".i"));
    }

    #[test]
    fn creates_unique_dir() {
        let dir = tempfile::tempdir().unwrap();
        let d = create_unique_dir(dir.path(), "distccd-").unwrap();
        assert!(d.is_dir());
    }
}
