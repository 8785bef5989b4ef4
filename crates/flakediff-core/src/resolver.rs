//! Artifact resolution against the nix build backend

use crate::errors::{FlakeDiffError, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::model::ResolvedArtifact;
use std::sync::Arc;

/// Build a `nix` invocation with the flake features switched on
pub fn nix_command(nix: &str) -> CommandSpec {
    CommandSpec::new(nix).args(["--extra-experimental-features", "nix-command flakes"])
}

/// Resolves flake references to store or derivation paths
#[derive(Clone)]
pub struct ArtifactResolver {
    runner: Arc<dyn CommandRunner>,
    nix: String,
}

impl ArtifactResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            nix: "nix".to_string(),
        }
    }

    /// Override the `nix` executable
    pub fn with_nix(mut self, nix: impl Into<String>) -> Self {
        self.nix = nix.into();
        self
    }

    /// Resolve `reference` to a path
    ///
    /// With `build` the reference is realised first and the output path is
    /// returned; without it only the derivation path is evaluated, which is
    /// enough to compare build plans.
    ///
    /// # Errors
    ///
    /// - `Build`: realisation exited non-zero
    /// - `PathInfo`: the path query exited non-zero or printed nothing
    pub async fn resolve(&self, reference: &str, build: bool) -> Result<ResolvedArtifact> {
        if build {
            self.realise(reference).await?;
        }

        let mut query = nix_command(&self.nix).arg("path-info");
        if !build {
            query = query.arg("--derivation");
        }
        let query = query.arg(reference);

        let output = self
            .runner
            .run(&query)
            .await
            .map_err(|e| FlakeDiffError::PathInfo {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;
        if !output.success() {
            return Err(FlakeDiffError::PathInfo {
                reference: reference.to_string(),
                message: output.failure_message(),
            });
        }

        let path = output
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| FlakeDiffError::PathInfo {
                reference: reference.to_string(),
                message: "path-info returned no output".to_string(),
            })?;

        tracing::debug!(reference, path, build, "resolved");
        Ok(ResolvedArtifact {
            reference: reference.to_string(),
            path: path.to_string(),
        })
    }

    async fn realise(&self, reference: &str) -> Result<()> {
        let spec = nix_command(&self.nix)
            .args(["build", "--no-link"])
            .arg(reference);
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| FlakeDiffError::Build {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;
        if !output.success() {
            return Err(FlakeDiffError::Build {
                reference: reference.to_string(),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Download the inputs of the flake at `root` ahead of evaluation
    ///
    /// Returns the failure reason instead of an error: prefetching is
    /// advisory and older nix versions lack the subcommand.
    pub async fn prefetch(&self, root: &str) -> std::result::Result<(), String> {
        let spec = nix_command(&self.nix)
            .args(["flake", "prefetch-inputs"])
            .arg(root);
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(output.failure_message()),
            Err(e) => Err(e.to_string()),
        }
    }
}
