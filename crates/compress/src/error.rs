#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("lzo1x compression failed")]
    LzoCompress,

    #[error("lzo1x decompression failed after exhausting output-buffer growth")]
    LzoDecompress,

    #[error("zstd error: {0}")]
    Zstd(#[from] std::io::Error),

    #[error("unknown compression algorithm {0:?}")]
    UnknownAlgorithm(String),
}
