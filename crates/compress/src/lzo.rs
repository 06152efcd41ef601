//! LZO1X-1, the only bulk-compression algorithm the wire protocol
//! itself ever negotiates (protocol versions 2 and 3).
//!
//! LZO has no self-describing magic or length prefix in its raw form,
//! so every chunk on the wire is preceded by the compressed length (the
//! token's value field); the plaintext length is never sent. On
//! decode, per spec.md §4.1, the destination buffer must be grown
//! geometrically on "output would overrun" starting from 8x the
//! compressed size.

use crate::error::CompressError;
use crate::Compressor;

pub struct Lzo1x;

/// Growth factor applied to the destination buffer each time
/// decompression reports it would overrun, as specified for this wire
/// format (starting point is 8x the compressed size).
const INITIAL_GROWTH: usize = 8;
const MAX_ATTEMPTS: u32 = 8;

impl Compressor for Lzo1x {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressError> {
        minilzo::compress(input).map_err(|_| CompressError::LzoCompress)
    }

    fn decompress(&self, input: &[u8], hint_len: usize) -> Result<Vec<u8>, CompressError> {
        let mut cap = (input.len() * INITIAL_GROWTH).max(hint_len).max(64);
        for _ in 0..MAX_ATTEMPTS {
            match minilzo::decompress(input, cap) {
                Ok(out) => return Ok(out),
                Err(_) => cap *= 2,
            }
        }
        Err(CompressError::LzoDecompress)
    }

    fn name(&self) -> &'static str {
        "lzo1x"
    }
}
