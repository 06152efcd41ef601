pub mod allow;
pub mod error;
pub mod frame;
pub mod ncpus;
pub mod privilege;

pub use allow::{is_allowed, parse_allow_list, Cidr};
pub use error::DaemonError;
pub use frame::{install_sigterm_handler, run_inetd, run_no_fork, run_standalone, DaemonMode};
pub use ncpus::default_max_kids;
pub use privilege::discard_root;
