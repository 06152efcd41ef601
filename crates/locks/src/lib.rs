//! Slot-level advisory locking and backoff timefiles (spec.md §4.3).

pub mod error;
pub mod filename;
pub mod slot;
pub mod timefile;

pub use error::LockError;
pub use slot::SlotLock;
