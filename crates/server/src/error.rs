use std::path::PathBuf;

use distcc_core::{ExitCode, HasExitCode};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] distcc_wire::WireError),

    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("compiler {0} is not on the allowlist")]
    CompilerNotAllowed(String),

    #[error("argv contains a rejected unsafe option: {0}")]
    UnsafeOption(String),

    #[error("absolute compiler paths are rejected: {0}")]
    AbsoluteCompilerPath(String),

    #[error("job exceeded its lifetime budget")]
    Timeout,

    #[error("empty argv")]
    EmptyArgv,
}

impl HasExitCode for ServerError {
    fn exit_code(&self) -> ExitCode {
        match self {
            ServerError::Protocol(_) => ExitCode::BadProtocol,
            ServerError::Io { .. } => ExitCode::IoError,
            ServerError::CompilerNotAllowed(_) | ServerError::AbsoluteCompilerPath(_) => {
                ExitCode::MissingBinary
            }
            ServerError::UnsafeOption(_) => ExitCode::BadArguments,
            ServerError::Timeout => ExitCode::Timeout,
            ServerError::EmptyArgv => ExitCode::BadArguments,
        }
    }
}
