use thiserror::Error;

/// Result type alias using FlakeDiffError
pub type Result<T> = std::result::Result<T, FlakeDiffError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that logging and the CLI top level
/// report, so callers can match on failures without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Configuration/Validation
    InvalidConfig,

    // Pipeline
    GitWorktree,
    PathInfo,
    Build,
    DiffTool,

    // Boundary collaborators
    GitHubApi,
    Artifact,

    // Integration/IO
    Io,
    Serialization,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::GitWorktree => "ERR_GIT_WORKTREE",
            ExErrorKind::PathInfo => "ERR_PATH_INFO",
            ExErrorKind::Build => "ERR_BUILD",
            ExErrorKind::DiffTool => "ERR_DIFF_TOOL",
            ExErrorKind::GitHubApi => "ERR_GITHUB_API",
            ExErrorKind::Artifact => "ERR_ARTIFACT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
        }
    }
}

/// Canonical structured error type
///
/// Flattened view of a [`FlakeDiffError`] with classification fields for
/// programmatic handling and the context needed in a single log line.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    reference: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            reference: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the build reference, path or artifact name the error concerns
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the reference context, if any
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(reference) = &self.reference {
            write!(f, " (reference: {})", reference)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for flakediff operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlakeDiffError {
    // ===== Pipeline Errors =====
    /// Fetching the base ref or creating/removing the checkout failed
    #[error("git worktree {operation} failed: {message}")]
    GitWorktree { operation: String, message: String },

    /// Path query failed or returned nothing
    #[error("failed to resolve path for {reference}: {message}")]
    PathInfo { reference: String, message: String },

    /// Forced realization failed
    #[error("failed to build {reference}: {message}")]
    Build { reference: String, message: String },

    /// The structural diff tool exited non-zero
    #[error("diff tool failed for {base_path} -> {head_path}: {message}")]
    DiffTool {
        base_path: String,
        head_path: String,
        message: String,
    },

    // ===== Boundary Errors =====
    /// Comment API request failed
    #[error("GitHub API {operation} failed: {message}")]
    GitHubApi { operation: String, message: String },

    /// Results handoff file could not be read or written
    #[error("artifact {name}: {message}")]
    Artifact { name: String, message: String },

    // ===== Validation Errors =====
    /// An input failed validation before any resource was acquired
    #[error("invalid input '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    // ===== Generic Errors =====
    /// Filesystem or environment error
    #[error("I/O error during {operation}: {message}")]
    Io { operation: String, message: String },

    /// Serialization error (JSON/YAML encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl FlakeDiffError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn io(operation: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Stable code of the kind this error maps to
    pub fn code(&self) -> &'static str {
        ExError::from(self.clone()).code()
    }
}

impl From<FlakeDiffError> for ExError {
    fn from(err: FlakeDiffError) -> Self {
        match err {
            FlakeDiffError::GitWorktree { operation, message } => {
                ExError::new(ExErrorKind::GitWorktree)
                    .with_op(operation)
                    .with_message(message)
            }

            FlakeDiffError::PathInfo { reference, message } => ExError::new(ExErrorKind::PathInfo)
                .with_op("path_info")
                .with_reference(reference)
                .with_message(message),

            FlakeDiffError::Build { reference, message } => ExError::new(ExErrorKind::Build)
                .with_op("build")
                .with_reference(reference)
                .with_message(message),

            FlakeDiffError::DiffTool {
                base_path,
                head_path,
                message,
            } => ExError::new(ExErrorKind::DiffTool)
                .with_op("diff")
                .with_reference(format!("{} -> {}", base_path, head_path))
                .with_message(message),

            FlakeDiffError::GitHubApi { operation, message } => {
                ExError::new(ExErrorKind::GitHubApi)
                    .with_op(operation)
                    .with_message(message)
            }

            FlakeDiffError::Artifact { name, message } => ExError::new(ExErrorKind::Artifact)
                .with_reference(name)
                .with_message(message),

            FlakeDiffError::InvalidConfig { field, reason } => {
                ExError::new(ExErrorKind::InvalidConfig)
                    .with_op("config")
                    .with_reference(field)
                    .with_message(reason)
            }

            FlakeDiffError::Io { operation, message } => ExError::new(ExErrorKind::Io)
                .with_op(operation)
                .with_message(message),

            FlakeDiffError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for FlakeDiffError {
    fn from(err: serde_json::Error) -> Self {
        FlakeDiffError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for FlakeDiffError {
    fn from(err: serde_yaml::Error) -> Self {
        FlakeDiffError::Serialization {
            message: err.to_string(),
        }
    }
}
