//! Lock/timefile filename derivation, grounded in
//! `examples/original_source/src/lock.c`'s `dcc_make_lock_filename`:
//! `<purpose>_localhost_<iter>`, `<purpose>_tcp_<host>_<port>_<iter>`,
//! `<purpose>_ssh_<host>_<iter>`. spec.md §4.3 names the simplified
//! `cpu_<mode>_<host>_<slot>` scheme; this module is the one place that
//! turns a `HostDef` + slot index into that exact string.

use std::path::{Path, PathBuf};

use distcc_core::model::Mode;
use distcc_core::HostDef;

pub fn lock_filename(lock_dir: &Path, purpose: &str, host: &HostDef, slot: u32) -> PathBuf {
    let name = match &host.mode {
        Mode::Local => format!("{purpose}_localhost_{slot}"),
        Mode::Tcp { hostname, port } => format!("{purpose}_tcp_{hostname}_{port}_{slot}"),
        Mode::Ssh { hostname, .. } => format!("{purpose}_ssh_{hostname}_{slot}"),
    };
    lock_dir.join(name)
}

/// `backoff_<host...>` per spec.md §4.3; uses the same host-identifying
/// suffix as `lock_filename` so collisions track the same physical host.
pub fn timefile_name(state_dir: &Path, timefile_kind: &str, host: &HostDef) -> PathBuf {
    let suffix = match &host.mode {
        Mode::Local => "localhost".to_string(),
        Mode::Tcp { hostname, port } => format!("tcp_{hostname}_{port}"),
        Mode::Ssh { hostname, .. } => format!("ssh_{hostname}"),
    };
    state_dir.join(format!("{timefile_kind}_{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use distcc_core::model::{CppWhere, Protocol};

    fn tcp_host() -> HostDef {
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
    fn derives_tcp_lock_filename() {
        let p = lock_filename(Path::new("/tmp/lock"), "cpu", &tcp_host(), 2);
        assert_eq!(p, Path::new("/tmp/lock/cpu_tcp_build01_3632_2"));
    }

    #[test]
    fn derives_local_timefile_name() {
        let p = timefile_name(Path::new("/tmp/state"), "backoff", &HostDef::local(2));
        assert_eq!(p, Path::new("/tmp/state/backoff_localhost"));
    }
}
