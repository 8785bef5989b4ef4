//! Action inputs and host context
//!
//! Inputs arrive the way the runner passes them to actions, as
//! `INPUT_<NAME>` environment variables. Everything is validated here,
//! before the pipeline touches git or nix.

use crate::errors::{FlakeDiffError, Result};
use crate::model::ComparisonTarget;
use crate::pipeline::normalize_path;
use flakediff_core_types::Sensitive;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default location of the results handoff file
pub const DEFAULT_RESULTS_PATH: &str = "flakediff-results.json";

/// Source of raw input values
pub trait InputSource {
    /// Raw value of input `name`; `None` when unset or blank
    fn get(&self, name: &str) -> Option<String>;
}

/// Inputs from `INPUT_<NAME>` variables (name upper-cased, spaces as `_`)
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvInputs;

impl InputSource for EnvInputs {
    fn get(&self, name: &str) -> Option<String> {
        let key = format!("INPUT_{}", name.replace(' ', "_").to_uppercase());
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Inputs from a fixed map
#[derive(Debug, Clone, Default)]
pub struct MapInputs(HashMap<String, String>);

impl MapInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }
}

impl InputSource for MapInputs {
    fn get(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// What one invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Diff and comment in one job
    Full,
    /// Diff only; results are handed off as a file
    Diff,
    /// Comment only, from handed-off results
    Comment,
}

impl FromStr for Mode {
    type Err = FlakeDiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Mode::Full),
            "diff" => Ok(Mode::Diff),
            "comment" => Ok(Mode::Comment),
            other => Err(FlakeDiffError::invalid_config(
                "mode",
                format!("expected full, diff or comment, got '{}'", other),
            )),
        }
    }
}

/// How the report is posted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStrategy {
    /// Always post a new comment
    Create,
    /// Edit the previous report comment when there is one
    Update,
}

impl FromStr for CommentStrategy {
    type Err = FlakeDiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(CommentStrategy::Create),
            "update" => Ok(CommentStrategy::Update),
            other => Err(FlakeDiffError::invalid_config(
                "comment-strategy",
                format!("expected create or update, got '{}'", other),
            )),
        }
    }
}

/// Validated action configuration
#[derive(Debug, Clone)]
pub struct ActionConfig {
    pub mode: Mode,
    pub attributes: Vec<ComparisonTarget>,
    pub build: bool,
    /// Flake directory relative to the workspace, normalised
    pub directory: PathBuf,
    pub comment_strategy: CommentStrategy,
    pub github_token: Sensitive<String>,
    pub results_path: PathBuf,
    pub suppress_minor_updates: bool,
    pub overflow_storage: bool,
}

impl ActionConfig {
    /// Read and validate every input
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending input.
    pub fn from_inputs(inputs: &dyn InputSource, workspace: &Path) -> Result<Self> {
        let mode = match inputs.get("mode") {
            Some(raw) => raw.parse()?,
            None => Mode::Full,
        };
        let comment_strategy = match inputs.get("comment-strategy") {
            Some(raw) => raw.parse()?,
            None => CommentStrategy::Create,
        };

        let attributes = match inputs.get("attributes") {
            Some(raw) => parse_attributes(&raw)?,
            None => Vec::new(),
        };
        if attributes.is_empty() && mode != Mode::Comment {
            return Err(FlakeDiffError::invalid_config(
                "attributes",
                "at least one attribute is required",
            ));
        }

        let directory = validate_directory(
            inputs.get("directory").as_deref().unwrap_or("."),
            workspace,
        )?;

        Ok(Self {
            mode,
            attributes,
            build: parse_bool(inputs, "build", false)?,
            directory,
            comment_strategy,
            github_token: Sensitive::new(inputs.get("github-token").unwrap_or_default()),
            results_path: inputs
                .get("results-path")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_PATH)),
            suppress_minor_updates: parse_bool(inputs, "suppress-minor-updates", false)?,
            overflow_storage: parse_bool(inputs, "overflow-storage", mode == Mode::Diff)?,
        })
    }
}

/// Parse the YAML (or JSON) attribute list
///
/// # Errors
///
/// `InvalidConfig` for malformed lists, empty fields or duplicate names.
pub fn parse_attributes(raw: &str) -> Result<Vec<ComparisonTarget>> {
    let targets: Vec<ComparisonTarget> = serde_yaml::from_str(raw)
        .map_err(|e| FlakeDiffError::invalid_config("attributes", e.to_string()))?;

    let mut seen = HashSet::new();
    for target in &targets {
        if target.display_name.trim().is_empty() {
            return Err(FlakeDiffError::invalid_config(
                "attributes",
                "DisplayName must not be empty",
            ));
        }
        if target.attribute_path.trim().is_empty() {
            return Err(FlakeDiffError::invalid_config(
                "attributes",
                format!("AttributePath of '{}' must not be empty", target.display_name),
            ));
        }
        if !seen.insert(target.display_name.as_str()) {
            return Err(FlakeDiffError::invalid_config(
                "attributes",
                format!("duplicate DisplayName '{}'", target.display_name),
            ));
        }
    }
    Ok(targets)
}

fn parse_bool(inputs: &dyn InputSource, name: &str, default: bool) -> Result<bool> {
    match inputs.get(name).as_deref() {
        None => Ok(default),
        Some("true" | "True" | "TRUE") => Ok(true),
        Some("false" | "False" | "FALSE") => Ok(false),
        Some(other) => Err(FlakeDiffError::invalid_config(
            name,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

/// Resolve `directory` against `workspace` and reject escapes
fn validate_directory(directory: &str, workspace: &Path) -> Result<PathBuf> {
    let workspace = normalize_path(workspace);
    let resolved = normalize_path(&workspace.join(directory));
    match resolved.strip_prefix(&workspace) {
        Ok(relative) if relative.as_os_str().is_empty() => Ok(PathBuf::from(".")),
        Ok(relative) => Ok(relative.to_path_buf()),
        Err(_) => Err(FlakeDiffError::invalid_config(
            "directory",
            format!("'{}' resolves outside the workspace", directory),
        )),
    }
}

/// Values the runner exposes about the current job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    /// `owner/repo`
    pub repository: String,
    pub server_url: String,
    pub api_url: String,
    pub run_id: String,
    pub workspace: PathBuf,
    pub event_path: Option<PathBuf>,
}

impl HostContext {
    /// Read the `GITHUB_*` variables, falling back to local defaults
    ///
    /// # Errors
    ///
    /// `Io` when no workspace is set and the current directory is unreadable.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let workspace = match var("GITHUB_WORKSPACE") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().map_err(|e| FlakeDiffError::io("current_dir", &e))?,
        };
        Ok(Self {
            repository: var("GITHUB_REPOSITORY").unwrap_or_default(),
            server_url: var("GITHUB_SERVER_URL").unwrap_or_else(|| "https://github.com".to_string()),
            api_url: var("GITHUB_API_URL").unwrap_or_else(|| "https://api.github.com".to_string()),
            run_id: var("GITHUB_RUN_ID").unwrap_or_else(|| "local".to_string()),
            workspace,
            event_path: var("GITHUB_EVENT_PATH").map(PathBuf::from),
        })
    }

    /// Web URL of the repository
    pub fn repository_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.repository
        )
    }

    /// Pull request the job runs for
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when there is no event payload or it is not a
    /// pull request event.
    pub fn pull_request(&self) -> Result<PullRequestInfo> {
        let path = self.event_path.as_ref().ok_or_else(|| {
            FlakeDiffError::invalid_config("GITHUB_EVENT_PATH", "not set; not running in a pull request job")
        })?;
        let raw = std::fs::read_to_string(path).map_err(|e| FlakeDiffError::io("read_event", &e))?;
        PullRequestInfo::from_event_json(&raw)
    }
}

/// Base and head of the pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub number: u64,
    pub base_ref: String,
    pub base_sha: String,
    pub head_sha: String,
}

#[derive(Deserialize)]
struct EventPayload {
    pull_request: Option<PullRequestPayload>,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: u64,
    base: RefPayload,
    head: RefPayload,
}

#[derive(Deserialize)]
struct RefPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: String,
}

impl PullRequestInfo {
    /// Extract the pull request from a webhook event payload
    ///
    /// # Errors
    ///
    /// `Serialization` for malformed JSON, `InvalidConfig` when the event
    /// carries no pull request.
    pub fn from_event_json(raw: &str) -> Result<Self> {
        let payload: EventPayload = serde_json::from_str(raw)?;
        let pr = payload.pull_request.ok_or_else(|| {
            FlakeDiffError::invalid_config("event", "event payload has no pull_request")
        })?;
        Ok(Self {
            number: pr.number,
            base_ref: pr.base.git_ref,
            base_sha: pr.base.sha,
            head_sha: pr.head.sha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> MapInputs {
        MapInputs::new().with(
            "attributes",
            "- DisplayName: web\n  AttributePath: nixosConfigurations.web.config.system.build.toplevel\n",
        )
    }

    #[test]
    fn test_defaults() {
        let config = ActionConfig::from_inputs(&base_inputs(), Path::new("/ws")).unwrap();
        assert_eq!(config.mode, Mode::Full);
        assert_eq!(config.comment_strategy, CommentStrategy::Create);
        assert!(!config.build);
        assert_eq!(config.directory, PathBuf::from("."));
        assert_eq!(config.results_path, PathBuf::from(DEFAULT_RESULTS_PATH));
        assert!(!config.overflow_storage);
        assert_eq!(config.attributes.len(), 1);
    }

    #[test]
    fn test_attributes_accept_json() {
        let targets =
            parse_attributes(r#"[{"displayName":"a","attributePath":"x"},{"DisplayName":"b","AttributePath":"y"}]"#)
                .unwrap();
        assert_eq!(targets[1], ComparisonTarget::new("b", "y"));
    }

    #[test]
    fn test_duplicate_display_names_rejected() {
        let err = parse_attributes("- {DisplayName: a, AttributePath: x}\n- {DisplayName: a, AttributePath: y}\n")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate DisplayName 'a'"));
    }

    #[test]
    fn test_malformed_attributes_rejected() {
        let err = parse_attributes("just a string").unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_CONFIG");
    }

    #[test]
    fn test_invalid_mode_and_strategy() {
        let err = ActionConfig::from_inputs(&base_inputs().with("mode", "fast"), Path::new("/ws"))
            .unwrap_err();
        assert!(err.to_string().contains("'mode'"));

        let err = ActionConfig::from_inputs(
            &base_inputs().with("comment-strategy", "replace"),
            Path::new("/ws"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'comment-strategy'"));
    }

    #[test]
    fn test_escaping_directory_rejected() {
        let err = ActionConfig::from_inputs(
            &base_inputs().with("directory", "sub/../../etc"),
            Path::new("/ws"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("outside the workspace"));

        let ok = ActionConfig::from_inputs(
            &base_inputs().with("directory", "./hosts/"),
            Path::new("/ws"),
        )
        .unwrap();
        assert_eq!(ok.directory, PathBuf::from("hosts"));
    }

    #[test]
    fn test_comment_mode_needs_no_attributes() {
        let config =
            ActionConfig::from_inputs(&MapInputs::new().with("mode", "comment"), Path::new("/ws"))
                .unwrap();
        assert!(config.attributes.is_empty());

        let err = ActionConfig::from_inputs(&MapInputs::new(), Path::new("/ws")).unwrap_err();
        assert!(err.to_string().contains("'attributes'"));
    }

    #[test]
    fn test_bad_boolean_rejected() {
        let err = ActionConfig::from_inputs(&base_inputs().with("build", "yes"), Path::new("/ws"))
            .unwrap_err();
        assert!(err.to_string().contains("'build'"));
    }

    #[test]
    fn test_pull_request_from_event() {
        let raw = r#"{"action":"synchronize","pull_request":{"number":7,
            "base":{"ref":"main","sha":"b1"},"head":{"ref":"feat","sha":"h1"}}}"#;
        let pr = PullRequestInfo::from_event_json(raw).unwrap();
        assert_eq!(
            pr,
            PullRequestInfo {
                number: 7,
                base_ref: "main".to_string(),
                base_sha: "b1".to_string(),
                head_sha: "h1".to_string(),
            }
        );

        let err = PullRequestInfo::from_event_json(r#"{"push":{}}"#).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_CONFIG");
    }

    #[test]
    fn test_repository_url() {
        let host = HostContext {
            repository: "o/r".to_string(),
            server_url: "https://github.com/".to_string(),
            api_url: "https://api.github.com".to_string(),
            run_id: "1".to_string(),
            workspace: PathBuf::from("/ws"),
            event_path: None,
        };
        assert_eq!(host.repository_url(), "https://github.com/o/r");
    }
}
