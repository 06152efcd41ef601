//! Opens the byte-stream transport to a host (spec.md §4.6 "Transport
//! open"): either a plain TCP connection, or an `ssh` subprocess whose
//! stdin/stdout are wired up as the connection's two halves.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use distcc_core::model::Mode;
use distcc_core::HostDef;

use crate::error::ClientError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The reliable byte stream a client session sends/receives its
/// protocol frame over, regardless of how it was opened.
pub enum Transport {
    Tcp(TcpStream),
    Ssh {
        child: Child,
        stdin: ChildStdin,
        stdout: ChildStdout,
    },
}

impl Transport {
    pub fn open(host: &HostDef, ssh_program: &str, connect_timeout: Duration) -> Result<Self, ClientError> {
        match &host.mode {
            Mode::Local => unreachable!("local hosts never open a transport"),
            Mode::Tcp { hostname, port } => Self::open_tcp(hostname, *port, connect_timeout),
            Mode::Ssh {
                hostname,
                user,
                ssh_command,
            } => Self::open_ssh(
                ssh_command.as_deref().unwrap_or(ssh_program),
                hostname,
                user.as_deref(),
            ),
        }
    }

    fn open_tcp(hostname: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let addr = (hostname, port)
            .to_socket_addrs()
            .map_err(|source| ClientError::ConnectFailed {
                host: hostname.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| ClientError::ConnectFailed {
                host: hostname.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no address resolved"),
            })?;

        let stream =
            TcpStream::connect_timeout(&addr, timeout).map_err(|source| ClientError::ConnectFailed {
                host: hostname.to_string(),
                source,
            })?;
        stream.set_nodelay(true).ok();
        Ok(Transport::Tcp(stream))
    }

    /// Forks `ssh [-l user] hostname <ssh_program_path> --inetd
    /// --enable-tcp-insecure` and wires its stdin/stdout as the
    /// connection. `ssh_program` here is the local `ssh` binary (or
    /// `DISTCC_SSH` override); the remote-side invocation is always the
    /// daemon binary name, fixed by convention.
    fn open_ssh(ssh_program: &str, hostname: &str, user: Option<&str>) -> Result<Self, ClientError> {
        let mut cmd = Command::new(ssh_program);
        if let Some(user) = user {
            cmd.arg("-l").arg(user);
        }
        cmd.arg(hostname)
            .arg("distccd --inetd --enable-tcp-insecure")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|source| ClientError::ConnectFailed {
            host: hostname.to_string(),
            source,
        })?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        Ok(Transport::Ssh { child, stdin, stdout })
    }

    /// Waits for the ssh child (no-op for TCP) so the process doesn't
    /// leak as a zombie once the session is done with the transport.
    pub fn finish(self) -> io::Result<()> {
        if let Transport::Ssh { mut child, .. } = self {
            child.wait()?;
        }
        Ok(())
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(s) => s.read(buf),
            Transport::Ssh { stdout, .. } => stdout.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(s) => s.write(buf),
            Transport::Ssh { stdin, .. } => stdin.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Tcp(s) => s.flush(),
            Transport::Ssh { stdin, .. } => stdin.flush(),
        }
    }
}
