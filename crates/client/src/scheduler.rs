//! `pick_host_from_list_and_lock_it` (spec.md §4.7): slot-major search
//! across the still-up, non-backed-off hosts in the list, non-blocking,
//! retrying forever until some `(host, slot)` pair is free.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use distcc_core::HostDef;
use distcc_hostlist::HostList;
use distcc_locks::{timefile, SlotLock};

use crate::error::ClientError;

/// The ceiling spec.md §4.6 names for the inner slot-index search
/// before the caller gives up on widening further within one sleep
/// cycle; in practice no host ever advertises this many slots, so this
/// only bounds the loop's worst case.
pub const MAX_SLOT_INDEX: u32 = 10_000;

pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_millis(1000);

pub struct PickedHost {
    pub host: HostDef,
    pub slot: u32,
    pub lock: SlotLock,
}

/// Locks and returns the first `(host, slot)` pair available, trying
/// slot index 0 across every host before moving to slot index 1 (this
/// is what "slot-major" means): it fills every host's first slot
/// before doubling up on any one host.
pub fn pick_host_from_list_and_lock_it(
    list: &HostList,
    lock_dir: &Path,
    state_dir: &Path,
    backoff_secs: u64,
    purpose: &str,
) -> Result<PickedHost, ClientError> {
    pick_with_sleep(list, lock_dir, state_dir, backoff_secs, purpose, |d| {
        thread::sleep(d)
    })
}

/// Same as [`pick_host_from_list_and_lock_it`] but with the sleep
/// function injected, so tests can assert on retry behavior without
/// actually blocking.
pub fn pick_with_sleep(
    list: &HostList,
    lock_dir: &Path,
    state_dir: &Path,
    backoff_secs: u64,
    purpose: &str,
    mut sleep: impl FnMut(Duration),
) -> Result<PickedHost, ClientError> {
    loop {
        let candidates: Vec<&HostDef> = list
            .up_hosts()
            .filter(|h| !timefile::is_backed_off(state_dir, h, backoff_secs).unwrap_or(false))
            .collect();

        if candidates.is_empty() {
            return Err(ClientError::NoHosts);
        }

        for slot in 0..MAX_SLOT_INDEX {
            for host in &candidates {
                if slot >= host.n_slots {
                    continue;
                }
                match SlotLock::try_acquire(lock_dir, purpose, host, slot) {
                    Ok(lock) => {
                        debug!(host = %host, slot, "picked host");
                        return Ok(PickedHost {
                            host: (*host).clone(),
                            slot,
                            lock,
                        });
                    }
                    Err(distcc_locks::LockError::Busy) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        trace!("no free slot on any host, sleeping before retry");
        sleep(DEFAULT_RETRY_PAUSE);
    }
}

/// Acquires a local-cpp slot against the built-in local host definition
/// (blocking, since local preprocessing may legitimately need to wait
/// rather than fail over — there is nowhere else to demote to).
pub fn lock_local_cpp(lock_dir: &Path, local: &HostDef, slot: u32) -> Result<SlotLock, ClientError> {
    SlotLock::acquire_blocking(lock_dir, "cpp", local, slot).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use distcc_hostlist::HostList;

    #[test]
    fn picks_first_available_slot_major() {
        let lock_dir = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let list = HostList::parse("build01/2 build02/2").unwrap();

        let picked = pick_with_sleep(&list, lock_dir.path(), state_dir.path(), 60, "cpu", |_| {
            panic!("should not need to sleep")
        })
        .unwrap();
        assert_eq!(picked.slot, 0);
        assert_eq!(picked.host.hostdef_string, "build01");
    }

    #[test]
    fn moves_to_next_host_when_first_slot_taken() {
        let lock_dir = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let list = HostList::parse("build01/1 build02/1").unwrap();

        let first = pick_with_sleep(&list, lock_dir.path(), state_dir.path(), 60, "cpu", |_| {
            panic!("unexpected sleep")
        })
        .unwrap();
        assert_eq!(first.host.hostdef_string, "build01");

        let second = pick_with_sleep(&list, lock_dir.path(), state_dir.path(), 60, "cpu", |_| {
            panic!("unexpected sleep")
        })
        .unwrap();
        assert_eq!(second.host.hostdef_string, "build02");
    }

    #[test]
    fn errors_when_every_host_is_backed_off() {
        let lock_dir = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let list = HostList::parse("build01").unwrap();
        timefile::mark(state_dir.path(), "backoff", &list.hosts[0]).unwrap();

        let result = pick_with_sleep(&list, lock_dir.path(), state_dir.path(), 60, "cpu", |_| {
            panic!("unexpected sleep")
        });
        assert!(matches!(result, Err(ClientError::NoHosts)));
    }
}
