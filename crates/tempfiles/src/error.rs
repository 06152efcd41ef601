use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TempFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("exhausted temp-name attempts")]
    ExhaustedAttempts,

    #[error("path {0:?} contains a NUL byte and cannot be used as a C string")]
    InteriorNul(PathBuf),
}
