//! Daemon frame (spec.md §4.13): the three operating modes distccd can
//! run in, and the parent's accept/reap/cap-enforcement loop for the
//! default standalone-forking mode.

use std::collections::HashSet;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, FromRawFd};

use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonMode {
    /// Default: parent forks a child per accepted connection.
    Standalone,
    /// Debug mode: one connection at a time, no fork.
    NoFork,
    /// The connection was already accepted by inetd and handed to us
    /// on stdin/stdout.
    Inetd,
}

/// Installs a handler that simply records that SIGTERM arrived;
/// `run_standalone`'s accept loop polls it between iterations so the
/// whole process group can be torn down cleanly rather than mid-accept.
static mut TERM_RECEIVED: bool = false;

extern "C" fn on_sigterm(_: libc::c_int) {
    // SAFETY: a plain bool write is async-signal-safe; no allocation,
    // no locking.
    unsafe {
        TERM_RECEIVED = true;
    }
}

pub fn install_sigterm_handler() {
    // SAFETY: sigaction with a handler taking only the signal number is
    // the documented safe subset of the nix API for simple flag-setting.
    unsafe {
        signal::sigaction(
            Signal::SIGTERM,
            &signal::SigAction::new(
                SigHandler::Handler(on_sigterm),
                signal::SaFlags::empty(),
                signal::SigSet::empty(),
            ),
        )
        .expect("installing SIGTERM handler");
    }
}

fn term_received() -> bool {
    // SAFETY: single-threaded read of a flag only ever set by the
    // signal handler above; a data race is impossible in this process
    // model (one thread, signal-driven mutation).
    unsafe { TERM_RECEIVED }
}

/// Runs the standalone forking accept loop: accepts connections,
/// forks a child to run `handler` for each, reaps finished children
/// continuously, and blocks in `waitpid` once `max_kids` children are
/// outstanding rather than accepting further connections.
pub fn run_standalone(
    listener: &TcpListener,
    max_kids: u32,
    mut handler: impl FnMut(TcpStream),
) -> io::Result<()> {
    let mut children: HashSet<Pid> = HashSet::new();

    loop {
        if term_received() {
            info!("SIGTERM received, tearing down process group");
            let _ = signal::killpg(Pid::this(), Signal::SIGTERM);
            return Ok(());
        }

        reap_finished(&mut children);

        if children.len() as u32 >= max_kids {
            if let Ok(WaitStatus::Exited(pid, _) | WaitStatus::Signaled(pid, _, _)) =
                waitpid(None, None)
            {
                children.remove(&pid);
            }
            continue;
        }

        let (stream, peer) = match listener.accept() {
            Ok(ok) => ok,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        // SAFETY: fork() itself is safe; the child immediately either
        // runs `handler` (ordinary Rust, no signal-unsafe work between
        // fork and that call) or exits via `_exit`, never returning up
        // through the parent's call stack.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child, .. }) => {
                children.insert(child);
                drop(stream);
            }
            Ok(ForkResult::Child) => {
                drop(listener.try_clone());
                handler(stream);
                std::process::exit(0);
            }
            Err(e) => {
                warn!(error = %e, %peer, "fork failed, handling connection inline");
                handler(stream);
            }
        }
    }
}

fn reap_finished(children: &mut HashSet<Pid>) {
    loop {
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                children.remove(&pid);
                info!(pid = pid.as_raw(), code, "child exited");
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                children.remove(&pid);
                warn!(pid = pid.as_raw(), ?sig, "child killed by signal");
            }
            _ => break,
        }
    }
}

/// Debug mode: handles one connection at a time, no fork at all.
pub fn run_no_fork(listener: &TcpListener, mut handler: impl FnMut(TcpStream)) -> io::Result<()> {
    loop {
        if term_received() {
            return Ok(());
        }
        let (stream, _) = listener.accept()?;
        handler(stream);
    }
}

/// inetd mode: the connection is already open on fd 0/1.
pub fn run_inetd(mut handler: impl FnMut(TcpStream)) {
    // SAFETY: inetd guarantees fd 0 is a connected socket when invoked
    // with `--inetd`; duplicating it keeps fd 0/1 usable for any
    // further stdio use by the handler's own children.
    let stream = unsafe { TcpStream::from_raw_fd(libc::dup(0)) };
    let _ = stream.as_raw_fd();
    handler(stream);
}
