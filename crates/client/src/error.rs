use std::path::PathBuf;

use distcc_core::{ExitCode, HasExitCode};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no hosts available")]
    NoHosts,

    #[error("bad hostspec: {0}")]
    BadHostSpec(String),

    #[error("connect to {host} failed: {source}")]
    ConnectFailed { host: String, source: std::io::Error },

    #[error("protocol error: {0}")]
    Protocol(#[from] distcc_wire::WireError),

    #[error("lock error: {0}")]
    Lock(#[from] distcc_locks::LockError),

    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("compiler {0} not found")]
    MissingBinary(String),

    #[error("recursive invocation detected (DISTCC_RECURSION_SAFEGUARD set)")]
    Recursion,

    #[error("all hosts exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("local compiler exited with signal")]
    CompilerCrashed,
}

impl HasExitCode for ClientError {
    fn exit_code(&self) -> ExitCode {
        match self {
            ClientError::NoHosts => ExitCode::NoHosts,
            ClientError::BadHostSpec(_) => ExitCode::BadHostSpec,
            ClientError::ConnectFailed { .. } => ExitCode::ConnectFailed,
            ClientError::Protocol(_) => ExitCode::BadProtocol,
            ClientError::Lock(_) => ExitCode::Busy,
            ClientError::Io { .. } => ExitCode::IoError,
            ClientError::MissingBinary(_) => ExitCode::MissingBinary,
            ClientError::Recursion => ExitCode::InterruptedSig,
            ClientError::Exhausted { .. } => ExitCode::NoHosts,
            ClientError::CompilerCrashed => ExitCode::CompilerCrashed,
        }
    }
}
