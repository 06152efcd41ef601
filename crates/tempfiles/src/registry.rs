//! A lock-free, append-only registry of temp paths, usable from a
//! signal handler: registration is the only place that allocates;
//! drain only walks already-allocated nodes and issues `unlink`/`rmdir`.
//!
//! Entries are pushed onto the head of an intrusive singly linked list,
//! so walking front-to-back visits them in reverse creation order —
//! exactly the order spec.md §4.14 requires at exit.

use std::ffi::CString;
use std::sync::atomic::{AtomicPtr, Ordering};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    File,
    Dir,
}

struct Entry {
    path: CString,
    kind: Kind,
    next: *mut Entry,
}

pub struct TempRegistry {
    head: AtomicPtr<Entry>,
    /// When set, deletion is skipped but entries are still drained
    /// (`DISTCC_SAVE_TEMPS=1`).
    save_temps: bool,
}

impl TempRegistry {
    #[must_use]
    pub const fn new(save_temps: bool) -> Self {
        TempRegistry {
            head: AtomicPtr::new(std::ptr::null_mut()),
            save_temps,
        }
    }

    /// Registers `path` (created by the caller just before this call).
    /// The only allocation in this module happens here, never in
    /// [`TempRegistry::drain`].
    pub fn register(&self, path: CString, kind: Kind) {
        let entry = Box::into_raw(Box::new(Entry {
            path,
            kind,
            next: std::ptr::null_mut(),
        }));
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            unsafe { (*entry).next = head };
            match self.head.compare_exchange_weak(
                head,
                entry,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
    }

    /// Deletes every registered path, files before directories within
    /// each node (a node already carries its own kind, so this is just
    /// "delete what this node says to delete" for each node in
    /// reverse-of-registration order). Safe to call from a signal
    /// handler: no allocation, only `unlink`/`rmdir` syscalls.
    ///
    /// # Safety
    /// Must not be called concurrently with itself (the exit path and a
    /// signal handler must not both drain at once); callers serialize
    /// this with a `sig_atomic_t`-style guard before installing the
    /// handler.
    pub fn drain(&self) {
        let mut node = self.head.swap(std::ptr::null_mut(), Ordering::AcqRel);
        while !node.is_null() {
            let entry = unsafe { &*node };
            if !self.save_temps {
                delete_one(&entry.path, entry.kind);
            }
            let next = entry.next;
            // Leaked intentionally: a concurrent signal-handler reader
            // may still be walking this node. Process exit reclaims it.
            node = next;
        }
    }
}

fn delete_one(path: &CString, kind: Kind) {
    unsafe {
        match kind {
            Kind::File => {
                libc::unlink(path.as_ptr());
            }
            Kind::Dir => {
                libc::rmdir(path.as_ptr());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn drain_visits_in_reverse_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"y").unwrap();

        let reg = TempRegistry::new(false);
        reg.register(CString::new(a.to_str().unwrap()).unwrap(), Kind::File);
        reg.register(CString::new(b.to_str().unwrap()).unwrap(), Kind::File);
        reg.drain();

        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn save_temps_skips_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        std::fs::write(&a, b"x").unwrap();

        let reg = TempRegistry::new(true);
        reg.register(CString::new(a.to_str().unwrap()).unwrap(), Kind::File);
        reg.drain();

        assert!(a.exists());
    }
}
