//! Shared data model: hosts, protocol negotiation, and job description.

use std::fmt;
use std::path::PathBuf;

/// How a host is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Run the compiler locally, no transport involved.
    Local,
    /// Plain TCP to `hostname:port`.
    Tcp { hostname: String, port: u16 },
    /// Forked `ssh` subprocess ending in the server's `--inetd` invocation.
    Ssh {
        hostname: String,
        user: Option<String>,
        ssh_command: Option<String>,
    },
}

/// Wire protocol version, negotiated once per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Protocol {
    /// Plain, uncompressed bulk transfer, cpp always run on the client.
    V1,
    /// LZO1X-compressed bulk transfer, cpp on the client.
    V2,
    /// LZO1X-compressed bulk transfer, cpp on the server.
    V3,
}

impl Protocol {
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Protocol::V1 => 1,
            Protocol::V2 => 2,
            Protocol::V3 => 3,
        }
    }

    #[must_use]
    pub const fn compressed(self) -> bool {
        !matches!(self, Protocol::V1)
    }

    #[must_use]
    pub const fn cpp_on_server(self) -> bool {
        matches!(self, Protocol::V3)
    }
}

/// Where the preprocessor actually runs for a given job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CppWhere {
    Client,
    Server,
}

/// A single configured distcc host, as produced by the hostlist parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDef {
    pub mode: Mode,
    /// Verbatim hostspec string this entry was parsed from, used in
    /// lock filenames and diagnostics.
    pub hostdef_string: String,
    /// Whether a prior failure marked this host down for the run.
    pub is_up: bool,
    /// Number of concurrent compile slots on this host.
    pub n_slots: u32,
    /// Number of concurrent local-cpp slots this host contributes
    /// (`localhost/N` style entries and the implicit local host).
    pub n_cpp_slots: u32,
    pub protocol: Protocol,
    pub compressed: bool,
    pub cpp_where: CppWhere,
}

impl HostDef {
    /// The entry distcc falls back on for compiling locally.
    #[must_use]
    pub fn local(n_slots: u32) -> Self {
        HostDef {
            mode: Mode::Local,
            hostdef_string: "localhost".to_string(),
            is_up: true,
            n_slots,
            n_cpp_slots: n_slots,
            protocol: Protocol::V1,
            compressed: false,
            cpp_where: CppWhere::Client,
        }
    }

    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self.mode, Mode::Local)
    }
}

impl fmt::Display for HostDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hostdef_string)
    }
}

/// How a compiler invocation was classified by the argv analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Send the compile job to a remote host (or localhost over the wire).
    Distribute,
    /// Run the preprocessor locally, but still distribute compilation.
    LocalCppOnly,
    /// Run the whole invocation locally; distribution makes no sense.
    LocalAll,
}

/// A single compile job as understood by the client session.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub disposition: Disposition,
}
