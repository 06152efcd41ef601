//! Dotd rewriter (spec.md §4.9): turns a dependency file produced in
//! the server's rehomed temp workspace back into one referring to the
//! client's own paths.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::ServerError;

/// Generous ceiling on one dependency line's length; matches the
/// original's `2 * MAXPATHLEN` guard against pathological input.
const MAX_LINE_LEN: usize = 2 * 4096;

/// Rewrites `server_dotd_path` into a new temp file under `out_dir`:
/// the first occurrence of `server_out_name` on each line becomes
/// `client_out_name` (the dependency *target*), and every occurrence of
/// `server_temp_root` is deleted (un-prefixing the rehomed paths).
/// Returns the new file's path.
pub fn rewrite_dotd(
    server_dotd_path: &Path,
    out_dir: &Path,
    server_temp_root: &str,
    client_out_name: &str,
    server_out_name: &str,
) -> Result<PathBuf, ServerError> {
    let input = std::fs::File::open(server_dotd_path).map_err(|source| ServerError::Io {
        path: server_dotd_path.to_path_buf(),
        source,
    })?;
    let out_path = out_dir.join("client.d");
    let mut output = std::fs::File::create(&out_path).map_err(|source| ServerError::Io {
        path: out_path.clone(),
        source,
    })?;

    let mut reader = BufReader::new(input);
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).map_err(|source| ServerError::Io {
            path: server_dotd_path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        if line.len() > MAX_LINE_LEN {
            return Err(ServerError::Io {
                path: server_dotd_path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "dotd line too long"),
            });
        }

        let rewritten = rewrite_line(&line, server_temp_root, client_out_name, server_out_name);
        output
            .write_all(rewritten.as_bytes())
            .map_err(|source| ServerError::Io {
                path: out_path.clone(),
                source,
            })?;
    }
    Ok(out_path)
}

fn rewrite_line(line: &str, server_temp_root: &str, client_out_name: &str, server_out_name: &str) -> String {
    let with_target = replace_first(line, server_out_name, client_out_name);
    with_target.replace(server_temp_root, "")
}

fn replace_first(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    match haystack.find(needle) {
        Some(idx) => {
            let mut out = String::with_capacity(haystack.len());
            out.push_str(&haystack[..idx]);
            out.push_str(replacement);
            out.push_str(&haystack[idx + needle.len()..]);
            out
        }
        None => haystack.to_string(),
    }
}
