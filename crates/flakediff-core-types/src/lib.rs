//! Core types shared across flakediff facilities
//!
//! This crate provides foundational types used by the pipeline, the
//! logging facility and the CLI:
//!
//! - **Correlation types**: RunId for tying log lines to one pipeline run
//! - **Sensitive data**: Sensitive<T> marker for the API token
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::RunId;
pub use sensitive::Sensitive;
