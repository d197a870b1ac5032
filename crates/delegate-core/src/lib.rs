pub mod assistant;
pub mod branch;
pub mod config;
pub mod error;
pub mod filename;
pub mod git;
pub mod github;
pub mod injection;
pub mod instructions;
pub mod loader;
pub mod pipeline;
pub mod reporter;

pub use assistant::{Assistant, CopilotAssistant};
pub use config::{ActionInput, AssistantSettings, DelegateConfig, GitHubContext, Repository, Token};
pub use error::{DelegateError, Result};
pub use git::{GitOps, SystemGit};
pub use github::GitHubClient;
pub use pipeline::{Pipeline, RunSummary};
pub use reporter::{ActionsReporter, Reporter};
