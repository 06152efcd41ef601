//! The server session (spec.md §4.8): handles one already-accepted
//! connection end to end, run in a forked child by the daemon frame.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{info, instrument, warn};

use distcc_argv::analyzer::{classify, AnalyzeOptions};
use distcc_wire::session::{read_request, write_reply, Reply, Request};

use crate::allowlist;
use crate::debug_info;
use crate::dotd;
use crate::error::ServerError;
use crate::workspace;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub cmdlist: Option<Vec<String>>,
    pub enable_tcp_insecure: bool,
    pub libexec_dirs: Vec<PathBuf>,
    pub job_lifetime: Duration,
    pub allow_assembly: bool,
}

/// Runs one request-reply cycle over `stream`. `tmp_root` is the
/// already-created per-job temp directory (the daemon creates and
/// cleans it up so this function stays transport-agnostic).
#[instrument(skip(stream, cfg, tmp_root))]
pub fn handle_connection(
    stream: &mut (impl Read + Write),
    cfg: &ServerConfig,
    tmp_root: &Path,
) -> Result<(), ServerError> {
    let request = read_request(stream)?;
    let reply = process_request(request, cfg, tmp_root)?;
    write_reply(stream, &reply)?;
    Ok(())
}

fn process_request(request: Request, cfg: &ServerConfig, tmp_root: &Path) -> Result<Reply, ServerError> {
    let cpp_on_server = distcc_wire::protover_implies_server_cpp(request.protover);

    if request.argv.is_empty() {
        return Err(ServerError::EmptyArgv);
    }

    let analysis = classify(&request.argv, AnalyzeOptions { allow_assembly: cfg.allow_assembly })
        .map_err(|_| ServerError::EmptyArgv)?;

    allowlist::reject_unsafe_options(&request.argv)?;
    let resolved_argv0 = allowlist::resolve_compiler(
        &request.argv[0],
        cfg.cmdlist.as_deref(),
        cfg.enable_tcp_insecure,
        &cfg.libexec_dirs,
    )?;

    let mut argv = request.argv.clone();
    argv[0] = resolved_argv0;

    let (compile_argv, server_input, server_output) = if cpp_on_server {
        workspace::materialize_files(tmp_root, &request.files)?;
        let input = analysis
            .input_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("a.c"));
        let dotd_path = workspace::default_dotd_path(tmp_root);
        let rewritten = workspace::rewrite_argv_for_workspace(&argv, tmp_root, &input, &dotd_path);
        let out = analysis.output_file.clone().unwrap_or_else(|| PathBuf::from("a.o"));
        (rewritten, input, tmp_root.join(out.strip_prefix("/").unwrap_or(&out)))
    } else {
        let doti = request.doti.clone().unwrap_or_default();
        let in_path = tmp_root.join("in.i");
        std::fs::write(&in_path, &doti).map_err(|source| ServerError::Io {
            path: in_path.clone(),
            source,
        })?;
        let out_path = tmp_root.join("out.o");
        let rewritten = rewrite_io_paths(&argv, &in_path, &out_path);
        (rewritten, in_path, out_path)
    };

    let (status, stdout, stderr) = run_compiler(&compile_argv, tmp_root, cfg.job_lifetime)?;

    let mut object = None;
    let mut dotd_body = None;
    if status == 0 {
        if let Ok(bytes) = std::fs::read(&server_output) {
            if !bytes.is_empty() {
                let mut bytes = bytes;
                if cpp_on_server {
                    let temp_root_str = tmp_root.to_string_lossy().into_owned();
                    debug_info::patch_debug_info(&mut bytes, temp_root_str.as_bytes());
                }
                object = Some(bytes);
            }
        }

        if cpp_on_server {
            let dotd_path = workspace::default_dotd_path(tmp_root);
            if dotd_path.exists() {
                let client_out = server_output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let rewritten_path = dotd::rewrite_dotd(
                    &dotd_path,
                    tmp_root,
                    &tmp_root.to_string_lossy(),
                    &client_out,
                    &server_output.to_string_lossy(),
                )?;
                dotd_body = std::fs::read(rewritten_path).ok();
            }
        }
    }

    Ok(Reply {
        protover: request.protover,
        status,
        stderr,
        stdout,
        object,
        dotd: dotd_body,
    })
}

fn rewrite_io_paths(argv: &[String], input: &Path, output: &Path) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len());
    let mut i = 0;
    let mut replaced_input = false;
    while i < argv.len() {
        let arg = argv[i].as_str();
        if arg == "-o" {
            out.push(arg.to_string());
            if argv.get(i + 1).is_some() {
                out.push(output.to_string_lossy().into_owned());
                i += 2;
                continue;
            }
        } else if !replaced_input && !arg.starts_with('-') && i > 0 {
            out.push(input.to_string_lossy().into_owned());
            replaced_input = true;
        } else {
            out.push(arg.to_string());
        }
        i += 1;
    }
    out
}

/// Forks the compiler, waits up to `lifetime`, and kills its process
/// group if it overruns (spec.md §4.8 step 8). Returns `(status,
/// stdout, stderr)`.
fn run_compiler(argv: &[String], cwd: &Path, lifetime: Duration) -> Result<(i32, Vec<u8>, Vec<u8>), ServerError> {
    let stdout_path = cwd.join("compiler.stdout");
    let stderr_path = cwd.join("compiler.stderr");
    let stdout_file = std::fs::File::create(&stdout_path).map_err(|source| ServerError::Io {
        path: stdout_path.clone(),
        source,
    })?;
    let stderr_file = std::fs::File::create(&stderr_path).map_err(|source| ServerError::Io {
        path: stderr_path.clone(),
        source,
    })?;

    let mut child = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .spawn()
        .map_err(|_| ServerError::CompilerNotAllowed(argv[0].clone()))?;

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > lifetime {
                    warn!(pid = child.id(), "job exceeded lifetime, killing process group");
                    let _ = signal::killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
                    child.wait().ok();
                    return Err(ServerError::Timeout);
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(ServerError::Io {
                    path: cwd.to_path_buf(),
                    source: e,
                })
            }
        }
    };

    let stdout = std::fs::read(&stdout_path).unwrap_or_default();
    let stderr = std::fs::read(&stderr_path).unwrap_or_default();
    info!(status = status.code(), "compiler finished");
    Ok((status.code().unwrap_or(128), stdout, stderr))
}
