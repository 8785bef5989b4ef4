//! Logging facility
//!
//! One initialization point plus the lifecycle macros used at operation
//! boundaries. Only the boundary owners (pipeline, checkout manager, cleanup)
//! emit start/end events; everything below logs with plain `tracing` calls.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
