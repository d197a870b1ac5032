use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DelegateError, Result};

pub const DEFAULT_BASE_BRANCH: &str = "main";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A secret that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret, for the places that must send it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ---------------------------------------------------------------------------
// ActionInput
// ---------------------------------------------------------------------------

/// The three inputs of the action, normalized.
#[derive(Debug, Clone)]
pub struct ActionInput {
    pub token: Token,
    /// `None` when the input was absent or empty.
    pub filename: Option<String>,
    pub base_branch: String,
}

impl ActionInput {
    /// Build from raw inputs. A missing or blank token is fatal; blank
    /// filename and branch fall back to their defaults.
    pub fn new(
        token: Option<String>,
        filename: Option<String>,
        base_branch: Option<String>,
    ) -> Result<Self> {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(DelegateError::MissingInput("PRIVATE_TOKEN"))?;
        let filename = filename.filter(|f| !f.trim().is_empty());
        let base_branch = base_branch
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string());
        Ok(Self {
            token: Token(token),
            filename,
            base_branch,
        })
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl FromStr for Repository {
    type Err = DelegateError;

    fn from_str(s: &str) -> Result<Self> {
        let (owner, name) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| DelegateError::InvalidRepository(s.to_string()))?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(DelegateError::InvalidRepository(s.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// GitHubContext / AssistantSettings
// ---------------------------------------------------------------------------

/// What the workflow run tells us about where we are.
#[derive(Debug, Clone)]
pub struct GitHubContext {
    pub repository: Repository,
    /// Login of the user or bot that triggered the run; PR assignee.
    pub actor: Option<String>,
    pub api_url: String,
    pub workspace: PathBuf,
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    /// Copilot CLI executable; `copilot` on `PATH` when unset.
    pub cli_path: Option<String>,
    /// Extra arguments placed before `--headless --stdio`.
    pub cli_args: Vec<String>,
    pub model: Option<String>,
    pub timeout: Duration,
    /// Bound on the CLI answering its handshake and creating the session.
    pub startup_timeout: Duration,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            cli_path: None,
            cli_args: Vec::new(),
            model: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            startup_timeout: Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// DelegateConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DelegateConfig {
    pub input: ActionInput,
    pub github: GitHubContext,
    pub assistant: AssistantSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_token_is_fatal() {
        for token in [None, Some(String::new()), Some("  ".to_string())] {
            let err = ActionInput::new(token, None, None).unwrap_err();
            assert!(matches!(err, DelegateError::MissingInput("PRIVATE_TOKEN")));
        }
    }

    #[test]
    fn defaults_apply_to_blank_inputs() {
        let input =
            ActionInput::new(Some("t".into()), Some(String::new()), Some(" ".into())).unwrap();
        assert_eq!(input.filename, None);
        assert_eq!(input.base_branch, "main");
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let input = ActionInput::new(Some("ghp_secret".into()), None, None).unwrap();
        let debug = format!("{input:?}");
        assert!(!debug.contains("ghp_secret"));
        assert_eq!(input.token.expose(), "ghp_secret");
    }

    #[test]
    fn repository_parses_owner_and_name() {
        let repo: Repository = "octo/widgets".parse().unwrap();
        assert_eq!(repo.owner, "octo");
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.to_string(), "octo/widgets");
    }

    #[test]
    fn malformed_repository_is_rejected() {
        for raw in ["", "octo", "/widgets", "octo/", "a/b/c"] {
            assert!(raw.parse::<Repository>().is_err(), "{raw}");
        }
    }
}
