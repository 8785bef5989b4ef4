//! Canonical schema constants for structured logging
//!
//! These constants keep field keys consistent between the lifecycle
//! macros and the test capture layer.

// Canonical field keys for structured logging
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_RUN_ID: &str = "run_id";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
