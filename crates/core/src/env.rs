//! Process environment read once at startup into explicit structs, so
//! tests can construct these directly instead of mutating the real
//! environment.

use std::env;
use std::path::PathBuf;

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

/// Resolves `$DISTCC_DIR`, defaulting to `~/.distcc`.
#[must_use]
pub fn distcc_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os("DISTCC_DIR") {
        return Some(PathBuf::from(dir));
    }
    home_dir().map(|h| h.join(".distcc"))
}

/// Environment relevant to the client (`distcc`).
#[derive(Debug, Clone, Default)]
pub struct ClientEnv {
    /// `DISTCC_HOSTS`, if set; takes priority over any hosts file.
    pub hosts: Option<String>,
    /// `DISTCC_DIR`.
    pub distcc_dir: Option<PathBuf>,
    /// `DISTCC_VERBOSE`.
    pub verbose: Option<String>,
    /// `DISTCC_LOG`.
    pub log_file: Option<PathBuf>,
    /// `DISTCC_BACKOFF_PERIOD`, seconds; `Some(0)` disables backoff.
    pub backoff_period: Option<u64>,
    /// `DISTCC_FALLBACK`, defaults to enabled when unset.
    pub fallback: Option<bool>,
    /// `DISTCC_SAVE_TEMPS`.
    pub save_temps: bool,
    /// `DEPENDENCIES_OUTPUT`, gcc/make convention for implicit `-MF`.
    pub dependencies_output: Option<String>,
}

impl ClientEnv {
    /// Reads the real process environment.
    #[must_use]
    pub fn from_process() -> Self {
        ClientEnv {
            hosts: env::var("DISTCC_HOSTS").ok(),
            distcc_dir: distcc_dir(),
            verbose: env::var("DISTCC_VERBOSE").ok(),
            log_file: env::var_os("DISTCC_LOG").map(PathBuf::from),
            backoff_period: env::var("DISTCC_BACKOFF_PERIOD")
                .ok()
                .and_then(|v| v.parse().ok()),
            fallback: env::var("DISTCC_FALLBACK")
                .ok()
                .map(|v| v != "0"),
            save_temps: env::var_os("DISTCC_SAVE_TEMPS").is_some(),
            dependencies_output: env::var("DEPENDENCIES_OUTPUT").ok(),
        }
    }

    /// Candidate hostfile locations in lookup order, used when
    /// `DISTCC_HOSTS` is unset: `$DISTCC_DIR/hosts`, `~/.distcc/hosts`,
    /// `/etc/distcc/hosts`.
    #[must_use]
    pub fn hostfile_search_path(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = &self.distcc_dir {
            paths.push(dir.join("hosts"));
        }
        if let Some(home) = home_dir() {
            let p = home.join(".distcc").join("hosts");
            if !paths.contains(&p) {
                paths.push(p);
            }
        }
        paths.push(PathBuf::from("/etc/distcc/hosts"));
        paths
    }
}

/// Environment relevant to the daemon (`distccd`).
#[derive(Debug, Clone, Default)]
pub struct DaemonEnv {
    pub log_file: Option<PathBuf>,
    pub verbose: Option<String>,
    /// `DISTCC_CMDLIST`, an explicit allowlist file of compiler paths.
    pub cmdlist: Option<PathBuf>,
}

impl DaemonEnv {
    #[must_use]
    pub fn from_process() -> Self {
        DaemonEnv {
            log_file: env::var_os("DISTCC_LOG").map(PathBuf::from),
            verbose: env::var("DISTCC_VERBOSE").ok(),
            cmdlist: env::var_os("DISTCC_CMDLIST").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostfile_search_path_ends_with_etc() {
        let env = ClientEnv {
            distcc_dir: Some(PathBuf::from("/tmp/.distcc")),
            ..Default::default()
        };
        let path = env.hostfile_search_path();
        assert_eq!(path.last().unwrap(), &PathBuf::from("/etc/distcc/hosts"));
        assert_eq!(path[0], PathBuf::from("/tmp/.distcc/hosts"));
    }
}
