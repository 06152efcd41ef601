use std::io;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed token header: {0:?}")]
    MalformedHeader(Vec<u8>),

    #[error("unexpected token tag: expected {expected:?}, got {got:?}")]
    UnexpectedTag { expected: &'static str, got: String },

    #[error("token value {0:?} is not valid 8-digit uppercase hex")]
    MalformedValue(Vec<u8>),

    #[error("peer closed connection mid-header")]
    Eof,

    #[error("bulk-body compression failed: {0}")]
    Compression(#[from] distcc_compress::CompressError),
}
