//! Per-job temp workspace materialization (spec.md §4.8 steps 3, 6):
//! rehomes the client's absolute paths under a fresh temp root so the
//! command line can be run as-is, then rewrites argv to match.

use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use distcc_wire::session::{IncludeFile, IncludeFileBody};

use crate::error::ServerError;

/// Flags whose argument is an absolute path that must be rehomed under
/// the temp root when materializing a server-cpp job.
const PATH_BEARING_FLAGS: &[&str] = &["-I", "-isystem", "-include", "-iquote", "-idirafter"];

/// Places each include-scanner file at `<root>/<its-absolute-path>`,
/// creating ancestor directories as needed; `Link` entries become
/// symlinks rather than regular files.
pub fn materialize_files(root: &Path, files: &[IncludeFile]) -> Result<(), ServerError> {
    for file in files {
        let dest = root.join(file.name.trim_start_matches('/'));
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ServerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        match &file.body {
            IncludeFileBody::File(bytes) => {
                std::fs::write(&dest, bytes).map_err(|source| ServerError::Io {
                    path: dest.clone(),
                    source,
                })?;
            }
            IncludeFileBody::Link(target) => {
                // Ignore a stale symlink left behind by a reused temp dir.
                let _ = std::fs::remove_file(&dest);
                symlink(target, &dest).map_err(|source| ServerError::Io {
                    path: dest.clone(),
                    source,
                })?;
            }
        }
    }
    Ok(())
}

/// Rewrites `argv` so every absolute path-bearing flag and the input
/// file are prefixed with `root`, drops any `-MT`/`-MQ` (the rewritten
/// dotd target is tracked separately and applied by the dotd rewriter,
/// not echoed back into argv), and forces `-MMD -MF <dotd_path>` unless
/// argv already requests a dependency file.
#[must_use]
pub fn rewrite_argv_for_workspace(argv: &[String], root: &Path, input_file: &Path, dotd_path: &Path) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len() + 2);
    let mut has_dep_flag = false;
    let mut i = 0;
    while i < argv.len() {
        let arg = argv[i].as_str();
        if arg == "-MT" || arg == "-MQ" {
            i += 2;
            continue;
        }
        if arg.starts_with("-MT") || arg.starts_with("-MQ") {
            i += 1;
            continue;
        }
        if arg.starts_with("-MD") || arg.starts_with("-MMD") {
            has_dep_flag = true;
            out.push(arg.to_string());
            i += 1;
            continue;
        }
        if let Some(flag) = PATH_BEARING_FLAGS.iter().find(|f| arg == **f) {
            out.push((*flag).to_string());
            if let Some(next) = argv.get(i + 1) {
                out.push(rehome(next, root));
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }
        if let Some(flag) = PATH_BEARING_FLAGS.iter().find(|f| arg.starts_with(**f)) {
            let rest = &arg[flag.len()..];
            out.push(format!("{flag}{}", rehome(rest, root)));
            i += 1;
            continue;
        }
        if Path::new(arg) == input_file {
            out.push(rehome(arg, root));
            i += 1;
            continue;
        }
        out.push(arg.to_string());
        i += 1;
    }

    if !has_dep_flag {
        out.push("-MMD".to_string());
        out.push("-MF".to_string());
        out.push(dotd_path.to_string_lossy().into_owned());
    }
    out
}

fn rehome(path: &str, root: &Path) -> String {
    if path.starts_with('/') {
        root.join(path.trim_start_matches('/')).to_string_lossy().into_owned()
    } else {
        path.to_string()
    }
}

/// Chooses the dotd output path to force via `-MF` when argv itself
/// doesn't already request a dependency file.
#[must_use]
pub fn default_dotd_path(root: &Path) -> PathBuf {
    root.join("server.d")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materializes_a_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![IncludeFile {
            name: "/usr/include/stdio.h".to_string(),
            body: IncludeFileBody::File(b"content".to_vec()),
        }];
        materialize_files(dir.path(), &files).unwrap();
        let written = std::fs::read(dir.path().join("usr/include/stdio.h")).unwrap();
        assert_eq!(written, b"content");
    }

    #[test]
    fn rewrites_absolute_include_flag_and_input() {
        let dir = tempfile::tempdir().unwrap();
        let argv = vec![
            "cc1".to_string(),
            "-I".to_string(),
            "/usr/include".to_string(),
            "-c".to_string(),
            "/home/user/project/hello.c".to_string(),
        ];
        let rewritten = rewrite_argv_for_workspace(
            &argv,
            dir.path(),
            Path::new("/home/user/project/hello.c"),
            &dir.path().join("server.d"),
        );
        assert_eq!(rewritten[2], dir.path().join("usr/include").to_string_lossy());
        assert_eq!(
            rewritten[4],
            dir.path().join("home/user/project/hello.c").to_string_lossy()
        );
        assert!(rewritten.contains(&"-MMD".to_string()));
    }

    #[test]
    fn strips_mt_and_keeps_existing_dep_flag() {
        let dir = tempfile::tempdir().unwrap();
        let argv = vec![
            "cc1".to_string(),
            "-MT".to_string(),
            "custom".to_string(),
            "-MMD".to_string(),
            "-c".to_string(),
            "hello.c".to_string(),
        ];
        let rewritten =
            rewrite_argv_for_workspace(&argv, dir.path(), Path::new("hello.c"), &dir.path().join("x.d"));
        assert!(!rewritten.iter().any(|a| a == "custom"));
        assert_eq!(rewritten.iter().filter(|a| a.as_str() == "-MMD").count(), 1);
        assert!(!rewritten.contains(&"-MF".to_string()));
    }
}
