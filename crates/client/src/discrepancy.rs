//! Fallback/discrepancy investigator (spec.md §4.11): decides whether a
//! remote/local disagreement is the build's own fault (inputs changed
//! mid-build) or a real distcc bug worth counting and mailing about.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use tracing::{info, warn};

use crate::error::ClientError;

/// Parses a Makefile-style dependency rule (`target: dep dep \` with
/// backslash line continuations) into its dependency paths, ignoring
/// the target itself.
#[must_use]
pub fn parse_dotd_dependencies(dotd: &[u8]) -> Vec<PathBuf> {
    let text = String::from_utf8_lossy(dotd);
    let joined = text.replace("\\\n", " ");
    let mut deps = Vec::new();
    for line in joined.lines() {
        let Some((_target, rest)) = line.split_once(':') else {
            continue;
        };
        for word in rest.split_whitespace() {
            deps.push(PathBuf::from(word));
        }
    }
    deps
}

/// `true` if the discrepancy should be attributed to the build having
/// modified its own inputs mid-compile (any dependency's mtime is at or
/// after `build_start` and it doesn't match `exclude_fresh_files`): in
/// that case the caller must not mail or count the event.
#[must_use]
pub fn attributable_to_self_modification(
    deps: &[PathBuf],
    build_start: SystemTime,
    exclude_fresh_files: Option<&str>,
) -> bool {
    deps.iter().any(|dep| {
        if let Some(pattern) = exclude_fresh_files {
            if path_matches_glob(dep, pattern) {
                return false;
            }
        }
        std::fs::metadata(dep)
            .and_then(|m| m.modified())
            .map(|mtime| mtime >= build_start)
            .unwrap_or(false)
    })
}

/// Minimal `*`/`?` glob match, sufficient for `DISTCC_EXCLUDE_FRESH_FILES`
/// patterns like `*/generated/*`.
fn path_matches_glob(path: &Path, pattern: &str) -> bool {
    let path_str = path.to_string_lossy();
    glob_match(pattern.as_bytes(), path_str.as_bytes())
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

/// Appends one byte to the per-build discrepancy counter file,
/// returning its size afterward (mirrors `dcc_increment_counter`).
pub fn increment_counter(state_dir: &Path) -> Result<u64, ClientError> {
    let path = counter_path(state_dir);
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .map_err(|source| ClientError::Io {
            path: path.clone(),
            source,
        })?;
    file.write_all(b"\0").map_err(|source| ClientError::Io {
        path: path.clone(),
        source,
    })?;
    file.metadata()
        .map(|m| m.len())
        .map_err(|source| ClientError::Io { path, source })
}

#[must_use]
pub fn counter_path(state_dir: &Path) -> PathBuf {
    state_dir.join("discrepancy_counter")
}

/// `true` once the counter has reached `threshold`: all subsequent
/// invocations in this build should demote to client-cpp.
#[must_use]
pub fn should_demote(state_dir: &Path, threshold: u64) -> bool {
    std::fs::metadata(counter_path(state_dir))
        .map(|m| m.len() >= threshold)
        .unwrap_or(false)
}

/// Sends a plain-text mail via the system `sendmail`/`mail` transport,
/// addressed to `whom_to_blame` (`DISTCC_EMAILLOG_WHOM_TO_BLAME`).
/// Failure to mail is logged but never escalated into a build failure.
pub fn mail_discrepancy(whom_to_blame: &str, subject: &str, body: &str) {
    let mut child = match Command::new("mail")
        .arg("-s")
        .arg(subject)
        .arg(whom_to_blame)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to spawn mail transport for discrepancy report");
            return;
        }
    };
    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(body.as_bytes());
    }
    match child.wait() {
        Ok(status) if status.success() => info!(%whom_to_blame, "discrepancy mailed"),
        Ok(status) => warn!(?status, "mail transport exited non-zero"),
        Err(e) => warn!(error = %e, "failed to wait on mail transport"),
    }
}
