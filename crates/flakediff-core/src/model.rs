//! Pipeline data model

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One named build-graph reference to diff between base and head
///
/// Accepts both the `DisplayName`/`AttributePath` spelling used in action
/// inputs and camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonTarget {
    #[serde(alias = "DisplayName", alias = "display_name")]
    pub display_name: String,
    #[serde(alias = "AttributePath", alias = "attribute_path")]
    pub attribute_path: String,
}

impl ComparisonTarget {
    pub fn new(display_name: impl Into<String>, attribute_path: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            attribute_path: attribute_path.into(),
        }
    }
}

/// A detached worktree of the base ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub path: PathBuf,
    pub base_ref: String,
}

impl Checkout {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A reference resolved to a store path or derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub reference: String,
    pub path: String,
}

/// Outcome of diffing one target
///
/// `base_ref`/`pr_ref` hold the commit SHAs that were compared. An empty
/// `diff` means "no differences", which is not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub display_name: String,
    #[serde(default)]
    pub attribute_path: String,
    #[serde(default)]
    pub base_ref: String,
    #[serde(default)]
    pub pr_ref: String,
    #[serde(default)]
    pub diff: String,
}

impl DiffResult {
    /// True when the diff body carries anything to show
    pub fn has_diff(&self) -> bool {
        !self.diff.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_accepts_action_input_spelling() {
        let target: ComparisonTarget =
            serde_json::from_str(r#"{"DisplayName":"web","AttributePath":"hosts.web"}"#).unwrap();
        assert_eq!(target, ComparisonTarget::new("web", "hosts.web"));
    }

    #[test]
    fn test_diff_result_minimal_shape() {
        let result: DiffResult =
            serde_json::from_str(r#"{"displayName":"web","diff":"x"}"#).unwrap();
        assert_eq!(result.display_name, "web");
        assert_eq!(result.diff, "x");
        assert!(result.base_ref.is_empty());
        assert!(result.pr_ref.is_empty());
    }

    #[test]
    fn test_whitespace_only_diff_has_no_diff() {
        let result = DiffResult {
            display_name: "a".to_string(),
            attribute_path: "a".to_string(),
            base_ref: String::new(),
            pr_ref: String::new(),
            diff: "\n  \n".to_string(),
        };
        assert!(!result.has_diff());
    }
}
