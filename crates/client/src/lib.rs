//! The distcc client session (spec.md §4.6/§4.7/§4.11/§4.12): picks a
//! host, opens a transport, sends the job, and falls back locally when
//! the remote attempt fails in a way that doesn't indict the host.

pub mod discrepancy;
pub mod error;
pub mod include_bridge;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use error::ClientError;
pub use scheduler::{pick_host_from_list_and_lock_it, PickedHost};
pub use session::{run_job, run_local, SessionConfig};
pub use transport::Transport;
