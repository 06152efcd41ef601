//! The client session state machine (spec.md §4.6): from an analyzed
//! job and a host list, through host selection, optional local
//! preprocessing, transport, and fallback, to a process exit status.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{info, instrument, warn};

use distcc_argv::preprocess;
use distcc_core::model::{CppWhere, Disposition, JobSpec, Protocol};
use distcc_core::HostDef;
use distcc_hostlist::HostList;
use distcc_locks::{timefile, SlotLock};
use distcc_wire::session::{read_reply, write_request, Reply, Request};

use crate::discrepancy;
use crate::error::ClientError;
use crate::include_bridge;
use crate::scheduler::{self, PickedHost};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub lock_dir: PathBuf,
    pub state_dir: PathBuf,
    pub backoff_secs: u64,
    pub connect_timeout: Duration,
    pub ssh_program: String,
    pub fallback_enabled: bool,
    pub skip_local_retry: bool,
    pub max_discrepancy: u64,
    /// Retry cap when backoff is disabled; unlimited (`None`) when
    /// backoff is enabled, per spec.md §4.6 "Verify and fallback".
    pub retry_cap: Option<u32>,
    pub local_slots: u32,
    /// `$INCLUDE_SERVER_PORT`, a UNIX socket path; `None` disables the
    /// include-scan step entirely (server-cpp jobs then rely on NFIL
    /// materializing nothing and the server resolving includes itself
    /// is out of scope, so in practice this should be set whenever any
    /// host is configured for server-side cpp).
    pub include_server_socket: Option<PathBuf>,
}

/// `true` when a non-zero recursion-guard environment variable is set,
/// meaning this invocation is itself a distcc-spawned subprocess and
/// must run locally regardless of disposition (guards against
/// self-invocation loops when `PATH` resolves distcc's own wrapper).
#[must_use]
pub fn recursion_guard_tripped() -> bool {
    std::env::var("DISTCC_RECURSION_SAFEGUARD")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .is_some_and(|level| level > 0)
}

/// `true` if any of the include-path environment variables that imply
/// the preprocessor's search path can't be reproduced server-side are
/// set, per spec.md §4.6 "Discrepancy adjustment".
#[must_use]
pub fn has_local_include_path_override() -> bool {
    ["CPATH", "C_INCLUDE_PATH", "CPLUS_INCLUDE_PATH"]
        .iter()
        .any(|name| std::env::var_os(name).is_some())
}

/// Demotes `cpp_where` to `Client` when any of the discrepancy-adjustment
/// conditions from spec.md §4.6 hold, recomputing `protover` to match.
pub fn apply_discrepancy_adjustment(host: &mut HostDef, already_preprocessed: bool, state_dir: &Path, max_discrepancy: u64) {
    let over_threshold = discrepancy::should_demote(state_dir, max_discrepancy.max(1));
    if host.cpp_where == CppWhere::Server
        && (over_threshold || already_preprocessed || has_local_include_path_override())
    {
        host.cpp_where = CppWhere::Client;
        host.protocol = match (host.protocol.compressed(), host.cpp_where) {
            (false, _) => Protocol::V1,
            (true, CppWhere::Client) => Protocol::V2,
            (true, CppWhere::Server) => Protocol::V3,
        };
    }
}

/// Runs one compile job to completion, returning the process exit
/// status the caller (normally `bin/distcc`) should itself exit with.
#[instrument(skip(job, hosts, cfg), fields(disposition = ?job.disposition))]
pub fn run_job(job: &JobSpec, hosts: &HostList, cfg: &SessionConfig) -> Result<i32, ClientError> {
    if matches!(job.disposition, Disposition::LocalAll) || recursion_guard_tripped() {
        return run_local(&job.argv, &job.cwd);
    }

    let mut attempts: u32 = 0;
    loop {
        if let Some(cap) = cfg.retry_cap {
            if attempts >= cap {
                return Err(ClientError::Exhausted { attempts });
            }
        }
        attempts += 1;

        let picked = scheduler::pick_host_from_list_and_lock_it(
            hosts,
            &cfg.lock_dir,
            &cfg.state_dir,
            cfg.backoff_secs,
            "cpu",
        )?;

        if picked.host.is_local() {
            drop(picked.lock);
            return run_local(&job.argv, &job.cwd);
        }

        match attempt_remote(job, picked, cfg) {
            Ok(status) => return Ok(status),
            Err(AttemptOutcome::RetryNextHost) => continue,
            Err(AttemptOutcome::Fatal(e)) => return Err(e),
        }
    }
}

enum AttemptOutcome {
    RetryNextHost,
    Fatal(ClientError),
}

impl From<ClientError> for AttemptOutcome {
    fn from(e: ClientError) -> Self {
        AttemptOutcome::Fatal(e)
    }
}

#[instrument(skip(job, picked, cfg), fields(host = %picked.host, slot = picked.slot))]
fn attempt_remote(job: &JobSpec, picked: PickedHost, cfg: &SessionConfig) -> Result<i32, AttemptOutcome> {
    let PickedHost { mut host, slot: _, lock } = picked;

    let already_preprocessed = matches!(job.disposition, Disposition::LocalCppOnly)
        || job
            .input_file
            .as_ref()
            .map(|p| p.extension().and_then(|e| e.to_str()) == Some("i"))
            .unwrap_or(false);

    apply_discrepancy_adjustment(&mut host, already_preprocessed, &cfg.state_dir, cfg.max_discrepancy.max(1));

    let mut scanned_files = Vec::new();
    if host.cpp_where == CppWhere::Server {
        let (cpp_where, files) = resolve_include_scan(job, &host, cfg);
        host.cpp_where = cpp_where;
        scanned_files = files;
        if host.cpp_where == CppWhere::Client {
            host.protocol = if host.protocol.compressed() { Protocol::V2 } else { Protocol::V1 };
        }
    }

    let mut local_cpp_lock: Option<SlotLock> = None;
    let mut cpp_child: Option<Child> = None;
    let mut doti_path: Option<PathBuf> = None;

    if host.cpp_where == CppWhere::Client && !already_preprocessed {
        let local = HostDef::local(cfg.local_slots);
        let lock = scheduler::lock_local_cpp(&cfg.lock_dir, &local, 0).map_err(AttemptOutcome::from)?;
        local_cpp_lock = Some(lock);

        let out = cfg.state_dir.join(format!("cpp-{}.i", std::process::id()));
        let child = preprocess::spawn_cpp(&job.argv, &job.cwd, &out).map_err(|e| {
            AttemptOutcome::Fatal(ClientError::Io {
                path: out.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })
        })?;
        cpp_child = Some(child);
        doti_path = Some(out);
    }

    let request = build_request(job, &host, scanned_files);

    let transport_result = Transport::open(&host, &cfg.ssh_program, cfg.connect_timeout);
    let mut transport = match transport_result {
        Ok(t) => t,
        Err(e) => {
            warn!(host = %host, error = %e, "transport open failed, disliking host");
            timefile::mark(&cfg.state_dir, "backoff", &host).ok();
            drop(lock);
            return Err(AttemptOutcome::RetryNextHost);
        }
    };

    if let Some(mut child) = cpp_child {
        let status = child.wait().map_err(|source| {
            AttemptOutcome::Fatal(ClientError::Io {
                path: doti_path.clone().unwrap_or_default(),
                source,
            })
        })?;
        if !status.success() {
            // The preprocessor itself failed; a local fallback gains
            // nothing since the same failure would recur locally.
            return Err(AttemptOutcome::Fatal(ClientError::CompilerCrashed));
        }
    }
    drop(local_cpp_lock);

    let mut request = request;
    if let Some(path) = &doti_path {
        request.doti = Some(std::fs::read(path).unwrap_or_default());
    }

    if let Err(e) = write_request(&mut transport, &request) {
        warn!(host = %host, error = %e, "send failed, disliking host");
        timefile::mark(&cfg.state_dir, "backoff", &host).ok();
        drop(lock);
        return Err(AttemptOutcome::RetryNextHost);
    }

    let expect_dotd = host.cpp_where == CppWhere::Server;
    let reply = match read_reply(&mut transport, expect_dotd) {
        Ok(r) => r,
        Err(e) => {
            warn!(host = %host, error = %e, "receive failed, disliking host");
            timefile::mark(&cfg.state_dir, "backoff", &host).ok();
            drop(lock);
            return Err(AttemptOutcome::RetryNextHost);
        }
    };
    transport.finish().ok();

    finish_reply(job, &host, reply, cfg, lock)
}

/// Consults the include-scanner for a server-cpp job (spec.md §4.6
/// "Include-scan"); on any failure to reach it or to read back the
/// files it named, demotes to client-cpp and continues rather than
/// failing the job. Returns the file bodies to ship when it stays
/// server-cpp.
fn resolve_include_scan(
    job: &JobSpec,
    host: &HostDef,
    cfg: &SessionConfig,
) -> (CppWhere, Vec<distcc_wire::session::IncludeFile>) {
    let Some(socket) = &cfg.include_server_socket else {
        return (CppWhere::Client, Vec::new());
    };
    let cwd = job.cwd.to_string_lossy();
    let mirror_root = socket.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("/"));
    let outcome = include_bridge::query_include_scanner(socket, &cwd, &job.argv)
        .and_then(|mirrored| include_bridge::collect_files(&mirrored, &mirror_root));
    match outcome {
        Ok(files) => {
            info!(host = %host, n_files = files.len(), "include-scan succeeded, staying server-cpp");
            (CppWhere::Server, files)
        }
        Err(e) => {
            warn!(host = %host, error = %e, "include-scan failed, demoting to client-cpp");
            (CppWhere::Client, Vec::new())
        }
    }
}

/// Local-only flags (`-D`/`-I`/etc.) are meaningless to the server once
/// the client has already preprocessed the source, so they're stripped
/// for the client-cpp path. Server-cpp jobs send the compile args
/// untouched — the server still needs `-I`/`-isystem`/... to rehome
/// against the materialized include tree (`workspace::rewrite_argv_for_workspace`).
fn build_request(job: &JobSpec, host: &HostDef, files: Vec<distcc_wire::session::IncludeFile>) -> Request {
    let argv = if host.cpp_where == CppWhere::Server {
        job.argv.clone()
    } else {
        distcc_argv::strip_local_args(&job.argv)
    };
    Request {
        protover: host.protocol.as_u32(),
        cdir: (host.cpp_where == CppWhere::Server).then(|| job.cwd.to_string_lossy().into_owned()),
        argv,
        files,
        doti: None,
    }
}

fn finish_reply(
    job: &JobSpec,
    host: &HostDef,
    reply: Reply,
    cfg: &SessionConfig,
    lock: SlotLock,
) -> Result<i32, AttemptOutcome> {
    std::io::stdout().write_all(&reply.stdout).ok();

    if reply.status == 0 {
        std::io::stderr().write_all(&reply.stderr).ok();
        if let (Some(object), Some(out_path)) = (&reply.object, &job.output_file) {
            std::fs::write(out_path, object).map_err(|source| {
                AttemptOutcome::Fatal(ClientError::Io {
                    path: out_path.clone(),
                    source,
                })
            })?;
        }
        timefile::remove(&cfg.state_dir, "backoff", host).ok();
        lock.release().ok();
        info!(host = %host, "remote compile succeeded");
        return Ok(0);
    }

    lock.release().ok();

    if reply.status >= 128 {
        warn!(host = %host, status = reply.status, "remote compiler killed by signal, disliking host");
        timefile::mark(&cfg.state_dir, "backoff", host).ok();
        return Err(AttemptOutcome::RetryNextHost);
    }

    if !cfg.fallback_enabled || cfg.skip_local_retry {
        // Remote failure is final: the server stderr is the diagnostic
        // the caller sees, per spec's "saved server stderr is still
        // copied to the client stderr" rule for both of these cases.
        std::io::stderr().write_all(&reply.stderr).ok();
        return Ok(reply.status);
    }

    // Server stderr stays suppressed here — a local retry follows and
    // its own diagnostic is what the caller should see, not both.
    info!(host = %host, status = reply.status, "remote compile failed, retrying locally");
    let local_status = run_local(&job.argv, &job.cwd).map_err(AttemptOutcome::from)?;
    if (local_status == 0) != (reply.status == 0) {
        discrepancy::increment_counter(&cfg.state_dir).ok();
    }
    Ok(local_status)
}

/// Spawns the compiler locally with argv unchanged: no stdio
/// redirection, since the compiler may legitimately read stdin.
pub fn run_local(argv: &[String], cwd: &Path) -> Result<i32, ClientError> {
    if argv.is_empty() {
        return Err(ClientError::MissingBinary(String::new()));
    }
    let status = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|_| ClientError::MissingBinary(argv[0].clone()))?;

    Ok(status.code().unwrap_or(128))
}

#[cfg(test)]
mod tests {
    use super::*;
    use distcc_core::model::Mode;

    fn server_cpp_host() -> HostDef {
        HostDef {
            mode: Mode::Tcp {
                hostname: "build01".into(),
                port: 3632,
            },
            hostdef_string: "build01".into(),
            is_up: true,
            n_slots: 4,
            n_cpp_slots: 4,
            protocol: Protocol::V3,
            compressed: true,
            cpp_where: CppWhere::Server,
        }
    }

    #[test]
    fn demotes_to_client_cpp_when_already_preprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = server_cpp_host();
        apply_discrepancy_adjustment(&mut host, true, dir.path(), 5);
        assert_eq!(host.cpp_where, CppWhere::Client);
        assert_eq!(host.protocol, Protocol::V2);
    }

    #[test]
    fn keeps_server_cpp_when_nothing_triggers_demotion() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = server_cpp_host();
        apply_discrepancy_adjustment(&mut host, false, dir.path(), 5);
        assert_eq!(host.cpp_where, CppWhere::Server);
    }

    #[test]
    fn demotes_once_discrepancy_counter_passes_threshold() {
        let dir = tempfile::tempdir().unwrap();
        discrepancy::increment_counter(dir.path()).unwrap();
        discrepancy::increment_counter(dir.path()).unwrap();
        let mut host = server_cpp_host();
        apply_discrepancy_adjustment(&mut host, false, dir.path(), 2);
        assert_eq!(host.cpp_where, CppWhere::Client);
    }

    #[test]
    fn run_local_propagates_exit_status() {
        let status = run_local(&["false".to_string()], Path::new("/")).unwrap();
        assert_ne!(status, 0);
        let status = run_local(&["true".to_string()], Path::new("/")).unwrap();
        assert_eq!(status, 0);
    }

    #[test]
    fn run_local_reports_missing_binary() {
        let err = run_local(&["definitely-not-a-real-compiler".to_string()], Path::new("/"));
        assert!(matches!(err, Err(ClientError::MissingBinary(_))));
    }
}
