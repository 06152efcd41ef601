//! Tracing subscriber setup shared by `distcc` and `distccd`.

use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

/// Installs a process-wide subscriber.
///
/// `verbose` maps `DISTCC_VERBOSE` (`off|error|warn|info|debug|trace`)
/// onto the filter; `log_file`, when given, sends output to that file
/// instead of stderr, matching the daemon's `--log-file` flag.
pub fn init(verbose: Option<&str>, log_file: Option<&Path>) {
    let filter = EnvFilter::try_new(verbose.unwrap_or("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            if let Ok(file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                let file = Arc::new(Mutex::new(file));
                builder.with_writer(move || WriterHandle(Arc::clone(&file))).init();
                return;
            }
            builder.init();
        }
        None => builder.init(),
    }
}

struct WriterHandle(Arc<Mutex<std::fs::File>>);

impl std::io::Write for WriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log file mutex poisoned").write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().expect("log file mutex poisoned").flush()
    }
}
