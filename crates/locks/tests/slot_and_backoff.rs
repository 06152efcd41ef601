//! Cross-module flow: slot locking plus the backoff timefile a failed
//! attempt leaves behind, as the client session actually uses them
//! together (acquire a slot, mark backoff on failure, have a second
//! scheduler pass skip the host).

use distcc_core::model::{CppWhere, Mode, Protocol};
use distcc_core::HostDef;
use distcc_locks::timefile;
use distcc_locks::{LockError, SlotLock};

fn remote_host() -> HostDef {
    HostDef {
        mode: Mode::Tcp { hostname: "build01".into(), port: 3632 },
        hostdef_string: "build01".into(),
        is_up: true,
        n_slots: 2,
        n_cpp_slots: 2,
        protocol: Protocol::V2,
        compressed: true,
        cpp_where: CppWhere::Client,
    }
}

#[test]
fn a_disliked_host_is_backed_off_even_after_its_slot_lock_is_released() {
    let lock_dir = tempfile::tempdir().unwrap();
    let state_dir = tempfile::tempdir().unwrap();
    let host = remote_host();

    let lock = SlotLock::try_acquire(lock_dir.path(), "cpu", &host, 0).unwrap();
    timefile::mark(state_dir.path(), "backoff", &host).unwrap();
    lock.release().unwrap();

    assert!(timefile::is_backed_off(state_dir.path(), &host, 60).unwrap());
    // The slot itself is free again even though the host is backed off —
    // those are independent pieces of state.
    let _reacquired = SlotLock::try_acquire(lock_dir.path(), "cpu", &host, 0).unwrap();
}

#[test]
fn two_distinct_purposes_on_the_same_host_slot_do_not_contend() {
    let lock_dir = tempfile::tempdir().unwrap();
    let host = remote_host();

    let _compile = SlotLock::try_acquire(lock_dir.path(), "cpu", &host, 0).unwrap();
    let _cpp = SlotLock::try_acquire(lock_dir.path(), "cpp", &host, 0).unwrap();
}

#[test]
fn busy_slot_reports_lock_error_busy_not_io_error() {
    let lock_dir = tempfile::tempdir().unwrap();
    let host = remote_host();

    let _held = SlotLock::try_acquire(lock_dir.path(), "cpu", &host, 0).unwrap();
    let err = SlotLock::try_acquire(lock_dir.path(), "cpu", &host, 0).unwrap_err();
    assert!(matches!(err, LockError::Busy));
}
