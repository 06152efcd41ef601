//! Compiler-identity check (spec.md §4.8 step 5): either match against
//! an explicit `DISTCC_CMDLIST` allowlist, or require argv[0] to be a
//! bare filename resolvable under the libexec compiler-wrapper
//! directory. Also rejects unsafe compiler options outright.

use std::path::{Path, PathBuf};

use crate::error::ServerError;

/// Options that let a compiler invocation escape the sandboxed temp
/// workspace or execute arbitrary code server-side.
const UNSAFE_OPTION_PREFIXES: &[&str] = &["-fplugin=", "-specs="];

pub fn reject_unsafe_options(argv: &[String]) -> Result<(), ServerError> {
    for arg in argv {
        if UNSAFE_OPTION_PREFIXES.iter().any(|p| arg.starts_with(p)) {
            return Err(ServerError::UnsafeOption(arg.clone()));
        }
    }
    Ok(())
}

/// Parses a `DISTCC_CMDLIST` file: one compiler path per non-blank,
/// non-`#`-comment line.
pub fn parse_cmdlist(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Resolves the effective compiler path for `argv0`, returning the
/// string argv[0] should be rewritten to before the compiler is forked.
pub fn resolve_compiler(
    argv0: &str,
    cmdlist: Option<&[String]>,
    enable_tcp_insecure: bool,
    libexec_dirs: &[PathBuf],
) -> Result<String, ServerError> {
    if let Some(list) = cmdlist {
        let wanted = basename(argv0);
        return list
            .iter()
            .find(|entry| basename(entry) == wanted)
            .cloned()
            .ok_or_else(|| ServerError::CompilerNotAllowed(argv0.to_string()));
    }

    if enable_tcp_insecure {
        // `--enable-tcp-insecure` explicitly opts out of the libexec
        // allowlist; any non-absolute compiler name is trusted as-is.
        if argv0.contains('/') && !argv0.starts_with("/bin/") && !argv0.starts_with("/usr/bin/") {
            return Err(ServerError::AbsoluteCompilerPath(argv0.to_string()));
        }
        return Ok(argv0.to_string());
    }

    if argv0.contains('/') && !argv0.starts_with("/bin/") && !argv0.starts_with("/usr/bin/") {
        return Err(ServerError::AbsoluteCompilerPath(argv0.to_string()));
    }

    let wanted = basename(argv0);
    for dir in libexec_dirs {
        let candidate = dir.join(wanted);
        if is_executable(&candidate) {
            return Ok(argv0.to_string());
        }
    }
    Err(ServerError::CompilerNotAllowed(argv0.to_string()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn rejects_fplugin_and_specs() {
        assert!(reject_unsafe_options(&["-fplugin=evil.so".into()]).is_err());
        assert!(reject_unsafe_options(&["-specs=evil.specs".into()]).is_err());
        assert!(reject_unsafe_options(&["-O2".into()]).is_ok());
    }

    #[test]
    fn cmdlist_matches_by_basename() {
        let list = vec!["/opt/cross/bin/arm-gcc".to_string()];
        let resolved = resolve_compiler("arm-gcc", Some(&list), false, &[]).unwrap();
        assert_eq!(resolved, "/opt/cross/bin/arm-gcc");
    }

    #[test]
    fn cmdlist_miss_is_rejected() {
        let list = vec!["gcc".to_string()];
        let err = resolve_compiler("clang", Some(&list), false, &[]);
        assert!(matches!(err, Err(ServerError::CompilerNotAllowed(_))));
    }

    #[test]
    fn absolute_path_outside_bin_is_rejected_without_cmdlist() {
        let err = resolve_compiler("/opt/cross/gcc", None, false, &[]);
        assert!(matches!(err, Err(ServerError::AbsoluteCompilerPath(_))));
    }

    #[test]
    fn bin_prefix_is_exempt_from_absolute_path_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_compiler("/bin/does-not-exist-anywhere", None, false, &[dir.path().to_path_buf()]);
        assert!(matches!(err, Err(ServerError::CompilerNotAllowed(_))));
    }

    #[test]
    fn resolves_bare_name_found_under_libexec() {
        let dir = tempfile::tempdir().unwrap();
        let gcc_path = dir.path().join("gcc");
        std::fs::write(&gcc_path, b"#!/bin/sh\n").unwrap();
        let mut perms = std::fs::metadata(&gcc_path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&gcc_path, perms).unwrap();

        let resolved = resolve_compiler("gcc", None, false, &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(resolved, "gcc");
    }
}
