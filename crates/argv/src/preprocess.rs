//! The local preprocessor driver (spec.md §4.5): when `cpp_where=Client`
//! and the input isn't already preprocessed, spawn the compiler with
//! `-E` into a temp file and return immediately so the network connect
//! can proceed in parallel.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::error::ArgvError;

/// Builds the cpp-only argv: a copy of `argv` with `-o…` stripped and
/// `-c`/`-S` replaced by `-E`.
#[must_use]
pub fn cpp_argv(argv: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len());
    let mut i = 0;
    let mut replaced_e = false;
    while i < argv.len() {
        let arg = argv[i].as_str();
        if arg == "-o" {
            i += 2;
            continue;
        }
        if arg.starts_with("-o") && arg.len() > 2 {
            i += 1;
            continue;
        }
        if arg == "-c" || arg == "-S" {
            if !replaced_e {
                out.push("-E".to_string());
                replaced_e = true;
            }
            i += 1;
            continue;
        }
        out.push(arg.to_string());
        i += 1;
    }
    if !replaced_e {
        out.push("-E".to_string());
    }
    out
}

/// Spawns the preprocessor child: stdin `/dev/null`, stdout redirected
/// to `out_path`, stderr inherited. Returns the running child; the
/// caller waits on it later (after the network connect has had a
/// chance to proceed in parallel).
pub fn spawn_cpp(argv: &[String], cwd: &Path, out_path: &Path) -> Result<Child, ArgvError> {
    let stdout_file = File::create(out_path).map_err(|_| {
        ArgvError::MissingOptionArgument(format!("cannot create {}", out_path.display()))
    })?;

    let args = cpp_argv(argv);
    let mut command = Command::new(&args[0]);
    command
        .args(&args[1..])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::inherit());

    command
        .spawn()
        .map_err(|_| ArgvError::MissingOptionArgument("failed to spawn preprocessor".to_string()))
}

/// Chooses the temp path for the preprocessed output, honoring the
/// extension mapping from `analyzer::preprocessed_suffix_for`.
#[must_use]
pub fn preprocessed_temp_path(tmp_dir: &Path, prefix: &str, input_ext: &str) -> PathBuf {
    let suffix = crate::analyzer::preprocessed_suffix_for(input_ext);
    tmp_dir.join(format!("{prefix}{suffix}"))
}
