//! Process exit codes.
//!
//! distcc clients and the daemon communicate failure modes to their
//! parent shell/make process through the exit status rather than through
//! stdout, so the numeric values below are part of the external contract
//! and must never be renumbered.

use std::fmt;

/// A distcc process exit status.
///
/// Values match the historical `dcc_exitcode` enum: 100 is the generic
/// failure, 101-120 are specific conditions a caller (typically `make`)
/// may want to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Distcc itself failed, apart from the compilation.
    Failed = 100,
    /// Bad arguments etc.
    BadArguments = 101,
    /// Bad hostspec.
    BadHostSpec = 102,
    /// Error in network protocol.
    BadProtocol = 103,
    /// Error setting up a compilation.
    Compiler = 104,
    /// Network I/O error.
    IoError = 105,
    /// Compiler binary cannot be found.
    MissingBinary = 106,
    /// Server respawned (binary not found).
    BindFailed = 107,
    /// Connect failed.
    ConnectFailed = 108,
    /// Compiler crashed.
    CompilerCrashed = 109,
    /// Timeout.
    Timeout = 110,
    /// Child failed with TERM / KILL.
    InterruptedSig = 111,
    /// System call failed.
    Posix = 112,
    /// Something went wrong in cpp stage.
    TempFile = 113,
    /// Host is overloaded; try again later.
    Busy = 114,
    /// No distcc servers available.
    NoHosts = 115,
    /// Out of memory.
    OutOfMemory = 116,
    /// Got SIGTERM.
    Gone = 118,
    /// Chose to run everything locally (help/version/preprocessed-only).
    LocalCpp = 120,
}

impl ExitCode {
    /// Returns the raw numeric status, suitable as a process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Human-readable description, used in top-level error reporting.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            ExitCode::Failed => "distcc failed",
            ExitCode::BadArguments => "bad arguments",
            ExitCode::BadHostSpec => "bad hostspec",
            ExitCode::BadProtocol => "protocol error",
            ExitCode::Compiler => "compiler setup error",
            ExitCode::IoError => "I/O error",
            ExitCode::MissingBinary => "missing binary",
            ExitCode::BindFailed => "bind failed",
            ExitCode::ConnectFailed => "connect failed",
            ExitCode::CompilerCrashed => "compiler crashed",
            ExitCode::Timeout => "timeout",
            ExitCode::InterruptedSig => "interrupted by signal",
            ExitCode::Posix => "system call failed",
            ExitCode::TempFile => "temp file error",
            ExitCode::Busy => "host busy",
            ExitCode::NoHosts => "no hosts available",
            ExitCode::OutOfMemory => "out of memory",
            ExitCode::Gone => "terminated",
            ExitCode::LocalCpp => "compiled locally",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

impl From<ExitCode> for i32 {
    fn from(value: ExitCode) -> Self {
        value.code()
    }
}

/// Implemented by every crate-local error enum so a binary can map any
/// failure to the right process exit status without a central match.
pub trait HasExitCode {
    fn exit_code(&self) -> ExitCode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_upstream_contract() {
        assert_eq!(ExitCode::Failed.code(), 100);
        assert_eq!(ExitCode::BadArguments.code(), 101);
        assert_eq!(ExitCode::Busy.code(), 114);
        assert_eq!(ExitCode::NoHosts.code(), 115);
        assert_eq!(ExitCode::OutOfMemory.code(), 116);
        assert_eq!(ExitCode::Gone.code(), 118);
        assert_eq!(ExitCode::LocalCpp.code(), 120);
    }

    #[test]
    fn converts_into_i32() {
        let code: i32 = ExitCode::Busy.into();
        assert_eq!(code, 114);
    }
}
