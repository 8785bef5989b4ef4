//! flakediff core - build-output diff pipeline and report engine
//!
//! This crate compares the build graph of a pull request's head against its
//! base branch and turns the result into a size-bounded review comment:
//! - Isolated base-branch checkouts with guaranteed release
//! - Artifact resolution against the build backend
//! - Structural diff invocation pinned to the base-branch context
//! - Sequential per-target orchestration with concurrent base/head work
//! - Fair truncation of many diffs into one comment body
//! - Text heuristics that classify diff noise
//! - Results handoff and pull request comment publishing

pub mod checkout;
pub mod comment;
pub mod config;
pub mod diff_tool;
pub mod errors;
pub mod exec;
pub mod filters;
pub mod handoff;
pub mod logging_facility;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod state;

// Re-export commonly used types
pub use checkout::{CheckoutGuard, CheckoutManager};
pub use comment::{publish_report, CommentApi, GithubCommentClient, PublishOutcome};
pub use config::{ActionConfig, CommentStrategy, HostContext, Mode};
pub use errors::{ExError, ExErrorKind, FlakeDiffError, Result};
pub use exec::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use model::{Checkout, ComparisonTarget, DiffResult, ResolvedArtifact};
pub use pipeline::{DiffPipeline, PipelineRequest};
pub use report::{format_report, ReportOptions};
pub use state::{StateStore, WORKTREE_PATH_KEY};
