//! The distcc wire codec: 12-byte ASCII token headers and the
//! request/reply framing built from them.

pub mod error;
pub mod session;
pub mod token;

pub use error::WireError;
pub use session::{
    protover_implies_compression, protover_implies_server_cpp, read_reply, read_request,
    write_reply, write_request, IncludeFile, IncludeFileBody, Reply, Request,
};
pub use token::tag;
