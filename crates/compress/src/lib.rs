//! Bulk-data compression backends for the wire codec.
//!
//! The protocol's bulk bodies (`DOTI`/`DOTO`/`DOTD`/`FILE`) are, for
//! protocol versions 2 and 3, compressed with LZO1X-1 — the same
//! algorithm and framing the original C implementation embeds via
//! minilzo. `Zstd` is carried here too as an available algorithm for
//! API completeness (see DESIGN.md's Open Question decision); the wire
//! codec itself never negotiates anything but LZO1X today.

pub mod error;
pub mod lzo;
pub mod zstd_backend;

pub use error::CompressError;

/// A symmetric bulk-data codec.
pub trait Compressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressError>;

    /// `hint_len` is the best guess at the decompressed size (typically
    /// the plaintext file's on-disk size, known to the sender but not
    /// transmitted); implementations may need to grow their buffer
    /// beyond it.
    fn decompress(&self, input: &[u8], hint_len: usize) -> Result<Vec<u8>, CompressError>;

    fn name(&self) -> &'static str;
}

/// Which compressor a job negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    None,
    Lzo1x,
    Zstd,
}

impl Algorithm {
    #[must_use]
    pub const fn available() -> &'static [Algorithm] {
        &[Algorithm::None, Algorithm::Lzo1x, Algorithm::Zstd]
    }

    #[must_use]
    pub const fn default_algorithm() -> Algorithm {
        Algorithm::Lzo1x
    }

    #[must_use]
    pub fn compressor(self) -> Box<dyn Compressor> {
        match self {
            Algorithm::None => Box::new(NoneCompressor),
            Algorithm::Lzo1x => Box::new(lzo::Lzo1x),
            Algorithm::Zstd => Box::new(zstd_backend::Zstd::default()),
        }
    }
}

struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressError> {
        Ok(input.to_vec())
    }

    fn decompress(&self, input: &[u8], _hint_len: usize) -> Result<Vec<u8>, CompressError> {
        Ok(input.to_vec())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_compressor_is_identity() {
        let c = NoneCompressor;
        let data = b"hello world";
        assert_eq!(c.compress(data).unwrap(), data);
        assert_eq!(c.decompress(data, data.len()).unwrap(), data);
    }
}
