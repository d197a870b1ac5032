use std::path::PathBuf;

use copilot_agent::CopilotAgentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("Input required and not supplied: {0}")]
    MissingInput(&'static str),

    #[error("Invalid filename length: {0} characters (must be between 1 and 255)")]
    FilenameLength(usize),

    #[error("Absolute paths are not allowed: {0}")]
    AbsolutePath(String),

    #[error("Path traversal detected in filename: {0}")]
    PathTraversal(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File too large: {} is {size} bytes (limit {limit} bytes)", .path.display())]
    SizeLimit { path: PathBuf, size: u64, limit: u64 },

    #[error("Not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    #[error("Potential prompt injection detected: {0}")]
    PromptInjection(String),

    #[error("invalid repository '{0}': expected 'owner/name'")]
    InvalidRepository(String),

    #[error("Copilot execution failed: {0}")]
    Assistant(#[from] CopilotAgentError),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DelegateError {
    /// Fatal errors abort the run; the rest are reported as warnings and the
    /// pipeline moves on to its next stage.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DelegateError::Assistant(_)
                | DelegateError::Git { .. }
                | DelegateError::GitHub(_)
                | DelegateError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DelegateError>;
