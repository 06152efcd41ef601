#[derive(Debug, thiserror::Error)]
pub enum HostListError {
    #[error("I/O error reading hostfile: {0}")]
    Io(#[from] std::io::Error),

    #[error("empty slot count in hostspec {0:?}: /0 is invalid")]
    ZeroSlots(String),

    #[error("invalid hostspec {0:?}")]
    InvalidHostspec(String),

    #[error("`cpp` feature requires `lzo` in hostspec {0:?}")]
    CppWithoutLzo(String),

    #[error("no hostfile found in any of the configured locations")]
    NoHostfile,
}
