//! Include-server bridge (spec.md §4.12): talks to the external
//! include-scanner over its UNIX socket, translating the scanner's
//! private mirror-tree paths back into the real, original paths.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use distcc_wire::token::{self, tag};

use crate::error::ClientError;

/// Sends `CDIR` + `ARGC`/`ARGV*` to the include-scanner socket and
/// reads back its own `ARGC`/`ARGV*` reply: the set of absolute paths
/// (under the scanner's private mirror tree) the job actually needs.
pub fn query_include_scanner(
    socket_path: &Path,
    cwd: &str,
    argv: &[String],
) -> Result<Vec<String>, ClientError> {
    let mut stream = UnixStream::connect(socket_path).map_err(|source| ClientError::Io {
        path: socket_path.to_path_buf(),
        source,
    })?;

    token::write_token_with_payload(&mut stream, tag::CDIR, cwd.as_bytes())?;
    token::write_token(&mut stream, tag::ARGC, argv.len() as u32)?;
    for arg in argv {
        token::write_token_with_payload(&mut stream, tag::ARGV, arg.as_bytes())?;
    }
    stream.flush().map_err(|source| ClientError::Io {
        path: socket_path.to_path_buf(),
        source,
    })?;

    let argc = token::read_expected_token(&mut stream, tag::ARGC)?;
    let mut mirrored = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        let (got_tag, bytes) = token::read_token_with_payload(&mut stream)?;
        if got_tag != tag::ARGV {
            return Err(distcc_wire::WireError::UnexpectedTag {
                expected: tag::ARGV,
                got: got_tag,
            }
            .into());
        }
        mirrored.push(String::from_utf8_lossy(&bytes).into_owned());
    }
    Ok(mirrored)
}

/// Recovers the real path from one of the scanner's mirror-tree paths:
/// `<mirror_root>/aaa/bbb/ccc/<real-path>[.abs][.lzo]` — strip
/// `mirror_root`, then the three sharding-hash directory components
/// that follow it, then a trailing `.abs`, then a trailing `.lzo`.
#[must_use]
pub fn recover_original_path(mirrored: &str, mirror_root: &Path) -> PathBuf {
    let relative = Path::new(mirrored)
        .strip_prefix(mirror_root)
        .unwrap_or_else(|_| Path::new(mirrored));

    let mut components: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str().unwrap_or_default())
        .collect();
    for _ in 0..3 {
        if !components.is_empty() {
            components.remove(0);
        }
    }
    let mut rest = components.join("/");

    if let Some(stripped) = rest.strip_suffix(".lzo") {
        rest = stripped.to_string();
    }
    if let Some(stripped) = rest.strip_suffix(".abs") {
        rest = stripped.to_string();
    }
    PathBuf::from(format!("/{rest}"))
}

/// `true` if `mirrored` names an already-LZO-compressed file body on
/// disk (the scanner compresses when it mirrors, and the client must
/// not compress it again regardless of the negotiated bulk algorithm).
#[must_use]
pub fn is_precompressed(mirrored: &str) -> bool {
    mirrored.ends_with(".lzo")
}

/// Reads each mirrored path's body off disk and pairs it with its
/// recovered original name, ready to go into a `Request`'s `files`
/// (spec.md §4.12: bodies already LZO-compressed by the scanner are
/// sent as-is, with no further compression applied here).
pub fn collect_files(
    mirrored: &[String],
    mirror_root: &Path,
) -> Result<Vec<distcc_wire::session::IncludeFile>, ClientError> {
    let mut files = Vec::with_capacity(mirrored.len());
    for path in mirrored {
        let name = recover_original_path(path, mirror_root).to_string_lossy().into_owned();
        let metadata = std::fs::symlink_metadata(path).map_err(|source| ClientError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        let body = if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(path).map_err(|source| ClientError::Io {
                path: PathBuf::from(path),
                source,
            })?;
            distcc_wire::session::IncludeFileBody::Link(target.to_string_lossy().into_owned())
        } else {
            let bytes = std::fs::read(path).map_err(|source| ClientError::Io {
                path: PathBuf::from(path),
                source,
            })?;
            distcc_wire::session::IncludeFileBody::File(bytes)
        };
        files.push(distcc_wire::session::IncludeFile { name, body });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_plain_path() {
        let root = Path::new("/tmp/distcc-XYZ");
        let p = recover_original_path("/tmp/distcc-XYZ/aaa/bbb/ccc/usr/include/stdio.h", root);
        assert_eq!(p, PathBuf::from("/usr/include/stdio.h"));
    }

    #[test]
    fn recovers_path_with_abs_and_lzo_suffixes() {
        let root = Path::new("/tmp/distcc-XYZ");
        let p = recover_original_path(
            "/tmp/distcc-XYZ/aaa/bbb/ccc/usr/include/stdio.h.abs.lzo",
            root,
        );
        assert_eq!(p, PathBuf::from("/usr/include/stdio.h"));
    }

    #[test]
    fn detects_precompressed_bodies() {
        assert!(is_precompressed("/tmp/x/a/b/c/foo.h.lzo"));
        assert!(!is_precompressed("/tmp/x/a/b/c/foo.h"));
    }
}
