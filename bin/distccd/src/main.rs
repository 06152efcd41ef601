//! `distccd`: the distcc server daemon. Accepts connections in one of
//! three modes (standalone forking, non-forking debug, inetd) and runs
//! each job through `distcc_server::handle_connection`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use distcc_core::env::DaemonEnv;
use distcc_core::HasExitCode;
use distcc_daemon::{self as daemon, DaemonMode};
use distcc_server::allowlist::parse_cmdlist;
use distcc_server::{handle_connection, ServerConfig};

const DEFAULT_PORT: u16 = 3632;

#[derive(Parser, Debug)]
#[command(name = "distccd", version)]
struct Cli {
    /// Run as a standalone daemon (the default when no mode flag is given).
    #[arg(long)]
    daemon: bool,
    /// The connection is already accepted and passed on stdin/stdout.
    #[arg(long)]
    inetd: bool,
    /// Stay attached to the controlling terminal.
    #[arg(long)]
    no_detach: bool,
    /// Handle one connection at a time, without forking.
    #[arg(long)]
    no_fork: bool,
    /// Maximum concurrent compile jobs; defaults to `ncpus + 2`.
    #[arg(long)]
    jobs: Option<u32>,
    /// TCP port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Address to bind to.
    #[arg(long, default_value = "0.0.0.0")]
    listen: String,
    /// Unprivileged user to switch to after binding.
    #[arg(long, default_value = "distcc")]
    user: String,
    /// Restrict clients to the given CIDR (repeatable).
    #[arg(long = "allow")]
    allow: Vec<String>,
    /// Skip the libexec allowlist check for the compiler binary.
    #[arg(long)]
    enable_tcp_insecure: bool,
    /// Write the daemon's pid to this file.
    #[arg(long)]
    pid_file: Option<PathBuf>,
    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// `tracing`-style filter string (e.g. `info`, `debug`).
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let env = DaemonEnv::from_process();

    let log_file = cli.log_file.clone().or(env.log_file.clone());
    let log_level = cli.log_level.clone().or(env.verbose.clone());
    distcc_core::logging::init(log_level.as_deref(), log_file.as_deref());

    if let Err(code) = run(&cli, &env) {
        return std::process::ExitCode::from(code.code() as u8);
    }
    std::process::ExitCode::SUCCESS
}

fn run(cli: &Cli, env: &DaemonEnv) -> Result<(), distcc_core::ExitCode> {
    let mode = if cli.inetd {
        DaemonMode::Inetd
    } else if cli.no_fork {
        DaemonMode::NoFork
    } else {
        DaemonMode::Standalone
    };

    let allow_list = daemon::parse_allow_list(&cli.allow);
    let cmdlist = load_cmdlist(env);
    let max_kids = cli.jobs.unwrap_or_else(daemon::default_max_kids);

    let cfg = ServerConfig {
        cmdlist,
        enable_tcp_insecure: cli.enable_tcp_insecure,
        libexec_dirs: vec![
            PathBuf::from("/usr/lib/distcc"),
            PathBuf::from("/usr/libexec/distcc"),
        ],
        job_lifetime: Duration::from_secs(
            std::env::var("DISTCC_JOB_LIFETIME").ok().and_then(|v| v.parse().ok()).unwrap_or(120),
        ),
        allow_assembly: std::env::var_os("DISTCC_ALLOW_ASSEMBLY").is_some(),
    };

    if mode == DaemonMode::Inetd {
        daemon::run_inetd(|stream| serve_one(stream, &cfg, None));
        return Ok(());
    }

    let addr: IpAddr = cli.listen.parse().unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let listener = TcpListener::bind(SocketAddr::new(addr, cli.port)).map_err(|source| {
        error!(%source, addr = %cli.listen, port = cli.port, "bind failed");
        distcc_core::ExitCode::BindFailed
    })?;

    daemon::discard_root(&cli.user).map_err(|e| e.exit_code())?;

    if let Some(pid_file) = &cli.pid_file {
        let _ = std::fs::write(pid_file, format!("{}\n", std::process::id()));
    }

    if !cli.no_detach && mode == DaemonMode::Standalone {
        let _ = nix::unistd::setsid();
    }

    daemon::install_sigterm_handler();
    info!(port = cli.port, mode = mode_name(mode), max_kids, "distccd listening");

    let result = match mode {
        DaemonMode::Standalone => {
            daemon::run_standalone(&listener, max_kids, |stream| serve_one(stream, &cfg, Some(&allow_list)))
        }
        DaemonMode::NoFork => {
            daemon::run_no_fork(&listener, |stream| serve_one(stream, &cfg, Some(&allow_list)))
        }
        DaemonMode::Inetd => unreachable!(),
    };

    result.map_err(|e| {
        error!(%e, "accept loop failed");
        distcc_core::ExitCode::IoError
    })
}

fn mode_name(mode: DaemonMode) -> &'static str {
    match mode {
        DaemonMode::Standalone => "standalone",
        DaemonMode::NoFork => "no-fork",
        DaemonMode::Inetd => "inetd",
    }
}

fn load_cmdlist(env: &DaemonEnv) -> Option<Vec<String>> {
    let path = env.cmdlist.as_ref()?;
    match std::fs::read_to_string(path) {
        Ok(contents) => Some(parse_cmdlist(&contents)),
        Err(e) => {
            warn!(?path, %e, "failed to read DISTCC_CMDLIST, ignoring");
            None
        }
    }
}

fn serve_one(mut stream: TcpStream, cfg: &ServerConfig, allow_list: Option<&[daemon::Cidr]>) {
    if let Some(list) = allow_list {
        if let Ok(SocketAddr::V4(peer)) = stream.peer_addr() {
            if !daemon::is_allowed(list, *peer.ip()) {
                warn!(peer = %peer, "client rejected by --allow");
                return;
            }
        }
    }

    let tmp_root = match distcc_tempfiles::create_unique_dir(std::path::Path::new("/tmp"), "distccd-") {
        Ok(dir) => dir,
        Err(e) => {
            error!(%e, "failed to create per-job temp root");
            return;
        }
    };

    if let Err(e) = handle_connection(&mut stream, cfg, &tmp_root) {
        warn!(%e, "job failed");
    }

    let _ = std::fs::remove_dir_all(&tmp_root);
}
