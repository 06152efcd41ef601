//! Shared types, configuration, and process plumbing used across the
//! distcc client, daemon, and every protocol-level crate in this
//! workspace.

pub mod env;
pub mod exit_code;
pub mod logging;
pub mod model;

pub use exit_code::{ExitCode, HasExitCode};
pub use model::{CppWhere, Disposition, HostDef, JobSpec, Mode, Protocol};
