//! zstd, carried as a second available algorithm (see DESIGN.md); not
//! reachable from the wire codec's own negotiation, which only ever
//! selects LZO1X for protocol versions 2/3.

use crate::error::CompressError;
use crate::Compressor;

pub struct Zstd {
    level: i32,
}

impl Default for Zstd {
    fn default() -> Self {
        Zstd { level: 3 }
    }
}

impl Compressor for Zstd {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressError> {
        zstd::stream::encode_all(input, self.level).map_err(CompressError::Zstd)
    }

    fn decompress(&self, input: &[u8], _hint_len: usize) -> Result<Vec<u8>, CompressError> {
        zstd::stream::decode_all(input).map_err(CompressError::Zstd)
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let codec = Zstd::default();
        let data = b"some data to round trip through zstd";
        let compressed = codec.compress(data).unwrap();
        let decompressed = codec.decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }
}
