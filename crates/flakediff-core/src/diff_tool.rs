//! Structural diff invocation
//!
//! The diff tool is taken from the base-branch checkout's flake inputs
//! (`--inputs-from <checkout>`). The head branch is untrusted: resolving
//! the tool from it would let a pull request swap in arbitrary code that
//! runs with the job's credentials. Callers must pass the checkout path.

use crate::errors::{FlakeDiffError, Result};
use crate::exec::CommandRunner;
use crate::resolver::nix_command;
use std::path::Path;
use std::sync::Arc;

/// Default installable providing the diff tool
pub const DEFAULT_DIFF_TOOL: &str = "nixpkgs#dix";

/// Runs the external structural diff tool
#[derive(Clone)]
pub struct DiffInvoker {
    runner: Arc<dyn CommandRunner>,
    nix: String,
    tool: String,
}

impl DiffInvoker {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            nix: "nix".to_string(),
            tool: DEFAULT_DIFF_TOOL.to_string(),
        }
    }

    pub fn with_nix(mut self, nix: impl Into<String>) -> Self {
        self.nix = nix.into();
        self
    }

    /// Override the installable that provides the diff tool
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Compare two resolved paths and return the tool's text output
    ///
    /// # Errors
    ///
    /// `DiffTool` when the tool exits non-zero. Stderr chatter on success is
    /// logged, not treated as a failure.
    pub async fn diff(
        &self,
        base_path: &str,
        head_path: &str,
        resolution_context: &Path,
    ) -> Result<String> {
        let spec = nix_command(&self.nix)
            .args(["run", "--inputs-from"])
            .arg(resolution_context.to_string_lossy())
            .arg(self.tool.as_str())
            .arg("--")
            .args([base_path, head_path])
            .current_dir(resolution_context);

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| tool_error(base_path, head_path, e.to_string()))?;
        if !output.success() {
            return Err(tool_error(base_path, head_path, output.failure_message()));
        }

        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            tracing::info!(stderr, "diff tool diagnostics");
        }
        Ok(output.stdout)
    }
}

fn tool_error(base_path: &str, head_path: &str, message: String) -> FlakeDiffError {
    FlakeDiffError::DiffTool {
        base_path: base_path.to_string(),
        head_path: head_path.to_string(),
        message,
    }
}
