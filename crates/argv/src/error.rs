use distcc_core::{ExitCode, HasExitCode};

#[derive(Debug, thiserror::Error)]
pub enum ArgvError {
    #[error("missing option argument after {0:?}")]
    MissingOptionArgument(String),

    #[error("empty argument list")]
    EmptyArgv,
}

impl HasExitCode for ArgvError {
    fn exit_code(&self) -> ExitCode {
        match self {
            ArgvError::MissingOptionArgument(_) => ExitCode::BadArguments,
            ArgvError::EmptyArgv => ExitCode::BadArguments,
        }
    }
}
