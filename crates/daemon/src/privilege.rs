//! Privilege drop (spec.md §4.8 "Privilege drop"; grounded in
//! `examples/original_source/src/setuid.c`'s `dcc_discard_root`): switch to
//! an unprivileged user, drop supplementary groups, and set
//! `PR_SET_NO_NEW_PRIVS` on Linux. Refuses to continue running as root.

use nix::unistd::{self, Gid, Group, Uid, User};
use tracing::{trace, warn};

use crate::error::DaemonError;

#[cfg(target_os = "linux")]
const PR_SET_NO_NEW_PRIVS: libc::c_int = 38;

/// Resolves `username`, falling back to `nobody`, then the traditional
/// 65534 if neither exists.
fn preferred_identity(username: &str) -> (Uid, Gid) {
    if let Ok(Some(user)) = User::from_name(username) {
        return (user.uid, user.gid);
    }
    warn!(%username, "no such user, falling back to \"nobody\"");
    if let Ok(Some(user)) = User::from_name("nobody") {
        return (user.uid, user.gid);
    }
    (Uid::from_raw(65534), Gid::from_raw(65534))
}

/// If currently root (real or effective uid), discards privileges by
/// switching to `username`'s identity. No-ops when already unprivileged.
pub fn discard_root(username: &str) -> Result<(), DaemonError> {
    if !unistd::getuid().is_root() && !unistd::geteuid().is_root() {
        return Ok(());
    }

    let (uid, gid) = preferred_identity(username);

    unistd::setgid(gid).map_err(|e| DaemonError::SetuidFailed(format!("setgid: {e}")))?;
    unistd::setgroups(&[gid]).map_err(|e| DaemonError::SetuidFailed(format!("setgroups: {e}")))?;
    unistd::setuid(uid).map_err(|e| DaemonError::SetuidFailed(format!("setuid: {e}")))?;

    if unistd::getuid().is_root() || unistd::geteuid().is_root() {
        return Err(DaemonError::StillRoot);
    }

    set_no_new_privs();

    trace!(uid = uid.as_raw(), gid = gid.as_raw(), "discarded root privileges");
    Ok(())
}

#[cfg(target_os = "linux")]
fn set_no_new_privs() {
    // SAFETY: prctl(PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) has no preconditions
    // beyond being a valid syscall; failure is non-fatal and only logged.
    let rc = unsafe { libc::prctl(PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if rc == 0 {
        trace!("set PR_SET_NO_NEW_PRIVS");
    } else {
        warn!("failed to set PR_SET_NO_NEW_PRIVS");
    }
}

#[cfg(not(target_os = "linux"))]
fn set_no_new_privs() {}

/// Looks up a group by name for `--allow`-style configuration; kept
/// here since it shares `nix::unistd` plumbing with identity lookup.
#[must_use]
pub fn group_by_name(name: &str) -> Option<Group> {
    Group::from_name(name).ok().flatten()
}
