//! Installs SIGTERM/SIGINT handlers that drain the temp registry before
//! terminating. The handler itself performs no allocation: it only
//! walks the registry's already-allocated nodes and calls `unlink`.

use std::sync::atomic::{AtomicPtr, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, Signal};

use crate::registry::TempRegistry;

static REGISTRY: AtomicPtr<TempRegistry> = AtomicPtr::new(std::ptr::null_mut());

/// Installs the cleanup handlers. `registry` must outlive the process
/// (`'static`, typically obtained by leaking a `Box<TempRegistry>` once
/// at startup).
///
/// # Safety
/// Must be called at most once per process; signal handler
/// installation is inherently process-global.
pub unsafe fn install(registry: &'static TempRegistry) {
    REGISTRY.store(
        registry as *const TempRegistry as *mut TempRegistry,
        Ordering::Release,
    );
    let action = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        nix::sys::signal::SigSet::empty(),
    );
    let _ = sigaction(Signal::SIGTERM, &action);
    let _ = sigaction(Signal::SIGINT, &action);
}

extern "C" fn handle_signal(signum: libc::c_int) {
    let ptr = REGISTRY.load(Ordering::Acquire);
    if !ptr.is_null() {
        unsafe { (*ptr).drain() };
    }
    unsafe { libc::_exit(128 + signum) };
}
