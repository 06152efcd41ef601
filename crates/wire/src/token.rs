//! The 12-byte token header: a 4-character ASCII tag followed by an
//! 8-character uppercase-hexadecimal integer, with no separator and no
//! trailing newline. Every structured field crossing the wire — the
//! argument count, each argument's byte length, file sizes, the
//! compiler's exit status — is carried by one of these headers,
//! optionally followed by that many bytes of payload.

use std::io::{Read, Write};

use crate::error::WireError;

/// Tag identifiers used throughout the protocol. Kept as plain byte
/// constants rather than an enum: unknown tags must round-trip through
/// forwarding code unharmed, and the set has historically grown
/// (e.g. `DOTI`/`DOTD` were added after the original four).
pub mod tag {
    pub const DIST: &str = "DIST";
    pub const DONE: &str = "DONE";
    pub const CDIR: &str = "CDIR";
    pub const ARGC: &str = "ARGC";
    pub const ARGV: &str = "ARGV";
    pub const NFIL: &str = "NFIL";
    pub const NAME: &str = "NAME";
    pub const LINK: &str = "LINK";
    pub const FILE: &str = "FILE";
    pub const DOTI: &str = "DOTI";
    pub const STAT: &str = "STAT";
    pub const SERR: &str = "SERR";
    pub const SOUT: &str = "SOUT";
    pub const DOTO: &str = "DOTO";
    pub const DOTD: &str = "DOTD";
}

const HEADER_LEN: usize = 12;
const TAG_LEN: usize = 4;
const VALUE_LEN: usize = 8;

/// Writes a single token header: `tag` (exactly 4 ASCII bytes) and
/// `value` rendered as 8 uppercase hex digits, zero-padded.
pub fn write_token(w: &mut impl Write, tag: &str, value: u32) -> Result<(), WireError> {
    debug_assert_eq!(tag.len(), TAG_LEN, "token tags are always 4 bytes");
    let mut buf = [0u8; HEADER_LEN];
    buf[..TAG_LEN].copy_from_slice(tag.as_bytes());
    let hex = format!("{value:08X}");
    buf[TAG_LEN..].copy_from_slice(hex.as_bytes());
    w.write_all(&buf)?;
    Ok(())
}

/// Writes a token followed immediately by `payload`, whose length must
/// equal `value` by convention (callers pass the byte length as the
/// token value for `FILE`/`ARGV`/`NAME`/... tags).
pub fn write_token_with_payload(
    w: &mut impl Write,
    tag: &str,
    payload: &[u8],
) -> Result<(), WireError> {
    write_token(w, tag, payload.len() as u32)?;
    w.write_all(payload)?;
    Ok(())
}

/// Reads one token header and returns `(tag, value)`.
pub fn read_token(r: &mut impl Read) -> Result<(String, u32), WireError> {
    let mut buf = [0u8; HEADER_LEN];
    read_exact_or_eof(r, &mut buf)?;

    let tag_bytes = &buf[..TAG_LEN];
    if !tag_bytes.iter().all(u8::is_ascii_alphanumeric) {
        return Err(WireError::MalformedHeader(buf.to_vec()));
    }
    let tag = String::from_utf8_lossy(tag_bytes).into_owned();

    let value_bytes = &buf[TAG_LEN..];
    if !value_bytes.iter().all(u8::is_ascii_hexdigit) {
        return Err(WireError::MalformedValue(value_bytes.to_vec()));
    }
    let value_str = std::str::from_utf8(value_bytes).map_err(|_| {
        WireError::MalformedValue(value_bytes.to_vec())
    })?;
    let value = u32::from_str_radix(value_str, 16)
        .map_err(|_| WireError::MalformedValue(value_bytes.to_vec()))?;

    Ok((tag, value))
}

/// Reads a token expected to carry `tag`, returning its value, or an
/// error if a different tag arrived.
pub fn read_expected_token(r: &mut impl Read, expected: &'static str) -> Result<u32, WireError> {
    let (tag, value) = read_token(r)?;
    if tag != expected {
        return Err(WireError::UnexpectedTag { expected, got: tag });
    }
    Ok(value)
}

/// Reads a token and then exactly `value` bytes of payload.
pub fn read_token_with_payload(r: &mut impl Read) -> Result<(String, Vec<u8>), WireError> {
    let (tag, len) = read_token(r)?;
    let mut payload = vec![0u8; len as usize];
    read_exact_or_eof(r, &mut payload)?;
    Ok((tag, payload))
}

fn read_exact_or_eof(r: &mut impl Read, buf: &mut [u8]) -> Result<(), WireError> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(WireError::Eof),
        Err(e) => Err(e.into()),
    }
}
