use distcc_core::{ExitCode, HasExitCode};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("bind to {addr} failed: {source}")]
    BindFailed { addr: String, source: std::io::Error },

    #[error("still running as root after attempting to discard privileges")]
    StillRoot,

    #[error("setuid/setgid failed: {0}")]
    SetuidFailed(String),

    #[error("no such user {0}")]
    NoSuchUser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HasExitCode for DaemonError {
    fn exit_code(&self) -> ExitCode {
        match self {
            DaemonError::BindFailed { .. } => ExitCode::BindFailed,
            DaemonError::StillRoot | DaemonError::SetuidFailed(_) => ExitCode::Posix,
            DaemonError::NoSuchUser(_) => ExitCode::BadArguments,
            DaemonError::Io(_) => ExitCode::IoError,
        }
    }
}
