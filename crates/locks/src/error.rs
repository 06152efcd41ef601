#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("I/O error on lock file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("slot is busy")]
    Busy,
}
