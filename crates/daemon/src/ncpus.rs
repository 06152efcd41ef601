//! `ncpus` autodetection (spec.md SUPPLEMENTED FEATURES #4;
//! `examples/original_source/src/ncpus.c`): `sysconf(_SC_NPROCESSORS_ONLN)`,
//! falling back to 1 if the platform can't answer.

use nix::unistd::{sysconf, SysconfVar};

#[must_use]
pub fn detect() -> u32 {
    match sysconf(SysconfVar::_SC_NPROCESSORS_ONLN) {
        Ok(Some(n)) if n > 0 => n as u32,
        _ => 1,
    }
}

/// `--jobs`'s default when unset: `ncpus + 2`, matching the daemon's
/// historical default for `dcc_max_kids`.
#[must_use]
pub fn default_max_kids() -> u32 {
    detect() + 2
}
