//! The distcc server session (spec.md §4.8–§4.10): compiler-identity
//! checking, temp-workspace materialization, the dotd rewriter, and the
//! debug-info patcher, all run per connection in a forked child.

pub mod allowlist;
pub mod debug_info;
pub mod dotd;
pub mod error;
pub mod session;
pub mod workspace;

pub use error::ServerError;
pub use session::{handle_connection, ServerConfig};
