//! `distcc`: the client-side compiler wrapper. Invoked as
//! `distcc <compiler> <args...>`, it analyzes the invocation, picks a
//! host, and runs the compile locally or on a remote distccd.

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use std::time::Duration;

use clap::Parser;

use distcc_argv::{analyzer, strip_local_args};
use distcc_client::{run_job, run_local, SessionConfig};
use distcc_core::env::ClientEnv;
use distcc_core::model::{Disposition, JobSpec};
use distcc_core::{ExitCode, HasExitCode};
use distcc_hostlist::HostList;

/// Distributed compiler driver.
#[derive(Parser, Debug)]
#[command(name = "distcc", version, trailing_var_arg = true)]
struct Cli {
    /// Print the resolved, backoff-filtered host list and exit.
    #[arg(long)]
    show_hosts: bool,

    /// Print the total slot count across all configured hosts and exit.
    #[arg(short = 'j')]
    job_count: bool,

    /// Run the include scanner bridge against the given argv and print
    /// the files it would ship, without compiling.
    #[arg(long)]
    scan_includes: bool,

    /// The compiler and its arguments, e.g. `gcc -c foo.c -o foo.o`.
    #[arg(allow_hyphen_values = true)]
    argv: Vec<String>,
}

fn main() -> ProcessExitCode {
    let cli = Cli::parse();
    let env = ClientEnv::from_process();
    distcc_core::logging::init(env.verbose.as_deref(), env.log_file.as_deref());

    let hosts = match HostList::load(&env) {
        Ok(hosts) => hosts,
        Err(e) => {
            eprintln!("distcc: {e}");
            return exit(ExitCode::BadHostSpec);
        }
    };

    if cli.show_hosts {
        for host in hosts.hosts.iter().filter(|h| h.is_up) {
            println!("{host}");
        }
        return ProcessExitCode::SUCCESS;
    }

    if cli.job_count {
        let total: u32 = hosts.hosts.iter().map(|h| h.n_slots).sum();
        println!("{total}");
        return ProcessExitCode::SUCCESS;
    }

    if cli.argv.is_empty() {
        eprintln!("distcc: no compiler command given");
        return exit(ExitCode::BadArguments);
    }

    if cli.scan_includes {
        println!("{}", strip_local_args(&cli.argv).join(" "));
        return ProcessExitCode::SUCCESS;
    }

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("distcc: getcwd failed: {e}");
            return exit(ExitCode::IoError);
        }
    };

    let analysis = match analyzer::classify(&cli.argv, analyzer::AnalyzeOptions::default()) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("distcc: {e}");
            return exit(e.exit_code());
        }
    };

    if distcc_client::session::recursion_guard_tripped() || analysis.verdict == Disposition::LocalAll {
        return run(run_local(&cli.argv, &cwd));
    }

    let job = JobSpec {
        argv: cli.argv.clone(),
        cwd: cwd.clone(),
        input_file: analysis.input_file.clone(),
        output_file: analysis.output_file.clone(),
        disposition: analysis.verdict,
    };

    let cfg = session_config(&env);
    run(run_job(&job, &hosts, &cfg))
}

fn session_config(env: &ClientEnv) -> SessionConfig {
    let dir = env.distcc_dir.clone().unwrap_or_else(|| PathBuf::from(".distcc"));
    SessionConfig {
        lock_dir: dir.join("lock"),
        state_dir: dir.join("state"),
        backoff_secs: env.backoff_period.unwrap_or(60),
        connect_timeout: Duration::from_secs(
            std::env::var("DISTCC_IO_TIMEOUT").ok().and_then(|v| v.parse().ok()).unwrap_or(300),
        ),
        ssh_program: std::env::var("DISTCC_SSH").unwrap_or_else(|_| "ssh".to_string()),
        fallback_enabled: env.fallback.unwrap_or(true),
        skip_local_retry: std::env::var_os("DISTCC_SKIP_LOCAL_RETRY").is_some(),
        max_discrepancy: std::env::var("DISTCC_MAX_DISCREPANCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
        retry_cap: (env.backoff_period == Some(0)).then_some(3),
        local_slots: hosts_local_slots(),
        include_server_socket: std::env::var_os("INCLUDE_SERVER_PORT").map(PathBuf::from),
    }
}

fn hosts_local_slots() -> u32 {
    std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1)
}

fn run(result: Result<i32, distcc_client::ClientError>) -> ProcessExitCode {
    match result {
        Ok(status) => ProcessExitCode::from(status as u8),
        Err(e) => {
            eprintln!("distcc: {e}");
            exit(e.exit_code())
        }
    }
}

fn exit(code: ExitCode) -> ProcessExitCode {
    ProcessExitCode::from(code.code() as u8)
}
