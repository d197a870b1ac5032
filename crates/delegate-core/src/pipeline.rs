//! The delegate run, start to finish.
//!
//! ```text
//! validate ─► generate ─► branch ─► commit ─► review ─► commit ─► open PR ─► assign
//! ```
//!
//! Input and instruction-file problems abort the run. Assistant, git and
//! GitHub failures are reported as warnings and the run moves on; a failed
//! PR creation ends it early without a `pr_number` output.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::assistant::Assistant;
use crate::branch::branch_name;
use crate::config::DelegateConfig;
use crate::error::Result;
use crate::git::{CommitOutcome, GitExec, GitOps};
use crate::github::{GitHubClient, NewPullRequest};
use crate::instructions::Instructions;
use crate::loader::{load_instructions, validate_file};
use crate::reporter::Reporter;

pub const CHANGES_COMMIT_MESSAGE: &str = "feat: apply Copilot changes";
pub const REVIEW_COMMIT_MESSAGE: &str = "docs: apply Copilot review";

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub branch: String,
    pub first_commit: CommitOutcome,
    pub review_commit: CommitOutcome,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    pub assignee: Option<String>,
}

pub struct Pipeline<'a, A, E> {
    config: &'a DelegateConfig,
    assistant: A,
    git: GitOps<E>,
    github: GitHubClient,
    reporter: &'a dyn Reporter,
}

impl<'a, A: Assistant, E: GitExec> Pipeline<'a, A, E> {
    pub fn new(
        config: &'a DelegateConfig,
        assistant: A,
        git: GitOps<E>,
        github: GitHubClient,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            config,
            assistant,
            git,
            github,
            reporter,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let instructions = self.instructions()?;

        self.generate(&instructions).await?;

        let branch = branch_name(Utc::now());
        self.git.create_branch(&branch);
        self.reporter.set_output("branch", &branch);

        let first_commit = self
            .git
            .commit_and_push(CHANGES_COMMIT_MESSAGE, &branch, self.reporter);

        self.generate(&Instructions::review()).await?;
        let review_commit = self
            .git
            .commit_and_push(REVIEW_COMMIT_MESSAGE, &branch, self.reporter);

        let mut summary = RunSummary {
            branch,
            first_commit,
            review_commit,
            pr_number: None,
            pr_url: None,
            assignee: None,
        };

        let title = format!("Copilot delegate: {}", summary.branch);
        let body = pr_body(&instructions, &summary);
        let request = NewPullRequest {
            title: &title,
            head: &summary.branch,
            base: &self.config.input.base_branch,
            body: &body,
        };
        let Some(mut pr) = self
            .github
            .create_pull_request(&request, self.reporter)
            .await
        else {
            warn!(branch = %summary.branch, "no pull request, skipping assignment");
            return Ok(summary);
        };

        match self.config.github.actor.as_deref().filter(|a| !a.is_empty()) {
            Some(actor) => {
                if self
                    .github
                    .assign_pull_request(pr.number, actor, self.reporter)
                    .await
                {
                    pr.assignee = Some(actor.to_string());
                }
            }
            None => self
                .reporter
                .warning("No triggering actor in the environment; pull request left unassigned"),
        }

        self.reporter.set_output("pr_number", &pr.number.to_string());
        info!(pr = pr.number, branch = %summary.branch, "delegate run complete");

        summary.pr_number = Some(pr.number);
        summary.pr_url = Some(pr.html_url);
        summary.assignee = pr.assignee;
        Ok(summary)
    }

    /// The default prompt, or the validated instruction file.
    fn instructions(&self) -> Result<Instructions> {
        match &self.config.input.filename {
            Some(name) => {
                let file = validate_file(&self.config.github.workspace, name)?;
                load_instructions(&file)
            }
            None => Ok(Instructions::default_prompt()),
        }
    }

    /// Run the assistant. Only fatal errors (rejected instructions) escape.
    async fn generate(&self, instructions: &Instructions) -> Result<()> {
        match self.assistant.run(instructions, self.reporter).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "continuing without assistant changes");
                Ok(())
            }
        }
    }
}

fn pr_body(instructions: &Instructions, summary: &RunSummary) -> String {
    format!(
        "Changes generated by GitHub Copilot.\n\n\
         - Instructions: {}\n\
         - Changes: {}\n\
         - Documentation and review: {}\n",
        instructions.source_label(),
        describe(summary.first_commit),
        describe(summary.review_commit),
    )
}

fn describe(outcome: CommitOutcome) -> &'static str {
    match outcome {
        CommitOutcome::Committed => "committed",
        CommitOutcome::NoChanges => "none",
        CommitOutcome::Failed => "failed to push",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BRANCH_PREFIX;
    use crate::config::{ActionInput, AssistantSettings, GitHubContext, Token};
    use crate::error::DelegateError;
    use crate::git::ScriptedGit;
    use crate::reporter::RecordingReporter;
    use copilot_agent::CopilotAgentError;
    use mockito::Matcher;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records the prompts and attachments it receives; optionally fails every call.
    #[derive(Default)]
    struct FakeAssistant {
        prompts: Mutex<Vec<String>>,
        sources: Mutex<Vec<Option<PathBuf>>>,
        fail: bool,
    }

    impl FakeAssistant {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl Assistant for &FakeAssistant {
        async fn run(&self, instructions: &Instructions, _reporter: &dyn Reporter) -> Result<()> {
            self.prompts.lock().unwrap().push(instructions.text.clone());
            self.sources
                .lock()
                .unwrap()
                .push(instructions.source_file.clone());
            if self.fail {
                return Err(DelegateError::Assistant(CopilotAgentError::Process(
                    "exited early".into(),
                )));
            }
            Ok(())
        }
    }

    fn config(workspace: &Path, filename: Option<&str>, actor: Option<&str>) -> DelegateConfig {
        DelegateConfig {
            input: ActionInput::new(Some("t0ken".into()), filename.map(String::from), None)
                .unwrap(),
            github: GitHubContext {
                repository: "octo/widgets".parse().unwrap(),
                actor: actor.map(String::from),
                api_url: String::new(),
                workspace: workspace.to_path_buf(),
                output_file: None,
            },
            assistant: AssistantSettings::default(),
        }
    }

    fn github(server: &mockito::Server) -> GitHubClient {
        GitHubClient::new(
            &server.url(),
            "octo/widgets".parse().unwrap(),
            Token::new("t0ken"),
        )
        .unwrap()
    }

    async fn pulls_ok(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("POST", "/repos/octo/widgets/pulls")
            .match_header("authorization", "Bearer t0ken")
            .match_body(Matcher::PartialJson(json!({ "base": "main" })))
            .with_status(201)
            .with_body(r#"{"number":42,"html_url":"https://github.com/octo/widgets/pull/42"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn end_to_end_opens_and_assigns_pr() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("task.md"), "Add a CHANGELOG entry").unwrap();
        let cfg = config(dir.path(), Some("task.md"), Some("monalisa"));

        let mut server = mockito::Server::new_async().await;
        let pulls = pulls_ok(&mut server).await;
        let assign = server
            .mock("POST", "/repos/octo/widgets/issues/42/assignees")
            .match_body(Matcher::Json(json!({ "assignees": ["monalisa"] })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let assistant = FakeAssistant::default();
        let reporter = RecordingReporter::default();
        let git = GitOps::new(ScriptedGit::with_codes(&[("diff-index", 1)]));
        let pipeline = Pipeline::new(&cfg, &assistant, git, github(&server), &reporter);

        let summary = pipeline.run().await.unwrap();

        pulls.assert_async().await;
        assign.assert_async().await;
        assert!(summary.branch.starts_with(BRANCH_PREFIX));
        assert_eq!(summary.pr_number, Some(42));
        assert_eq!(summary.assignee.as_deref(), Some("monalisa"));
        assert_eq!(summary.first_commit, CommitOutcome::Committed);
        assert_eq!(summary.review_commit, CommitOutcome::Committed);
        assert_eq!(reporter.output("branch"), Some(summary.branch.clone()));
        assert_eq!(reporter.output("pr_number").as_deref(), Some("42"));

        let prompts = assistant.prompts.lock().unwrap().clone();
        assert_eq!(prompts, ["Add a CHANGELOG entry", Instructions::review().text.as_str()]);

        let calls = pipeline.git.exec().calls();
        assert_eq!(calls[0], ["checkout", "-b", summary.branch.as_str()]);
        let commits: Vec<_> = calls.iter().filter(|c| c[0] == "commit").collect();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0][2], CHANGES_COMMIT_MESSAGE);
        assert_eq!(commits[1][2], REVIEW_COMMIT_MESSAGE);
    }

    #[tokio::test]
    async fn end_to_end_without_filename_uses_default_prompt() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), None, Some("monalisa"));

        let mut server = mockito::Server::new_async().await;
        let pulls = server
            .mock("POST", "/repos/octo/widgets/pulls")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "base": "main" })),
                Matcher::Regex("Instructions: default prompt".into()),
            ]))
            .with_status(201)
            .with_body(r#"{"number":42,"html_url":"https://github.com/octo/widgets/pull/42"}"#)
            .create_async()
            .await;
        let assign = server
            .mock("POST", "/repos/octo/widgets/issues/42/assignees")
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let assistant = FakeAssistant::default();
        let reporter = RecordingReporter::default();
        let git = GitOps::new(ScriptedGit::with_codes(&[("diff-index", 1)]));
        let pipeline = Pipeline::new(&cfg, &assistant, git, github(&server), &reporter);

        let summary = pipeline.run().await.unwrap();

        pulls.assert_async().await;
        assign.assert_async().await;
        let prompts = assistant.prompts.lock().unwrap().clone();
        assert_eq!(prompts[0], Instructions::default_prompt().text);
        let sources = assistant.sources.lock().unwrap().clone();
        assert_eq!(sources, [None, None]);

        let branch = reporter.output("branch").unwrap();
        assert!(branch.starts_with(BRANCH_PREFIX), "{branch}");
        assert_eq!(branch, summary.branch);
        assert_eq!(reporter.output("pr_number").as_deref(), Some("42"));
        assert_eq!(summary.pr_number, Some(42));
    }

    #[tokio::test]
    async fn missing_file_fails_before_assistant_runs() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), Some("missing.txt"), Some("monalisa"));
        let server = mockito::Server::new_async().await;

        let assistant = FakeAssistant::default();
        let reporter = RecordingReporter::default();
        let git = GitOps::new(ScriptedGit::default());
        let pipeline = Pipeline::new(&cfg, &assistant, git, github(&server), &reporter);

        let err = pipeline.run().await.unwrap_err();

        assert!(err.to_string().contains("File not found"), "{err}");
        assert_eq!(assistant.calls(), 0);
        assert!(pipeline.git.exec().calls().is_empty());
        assert_eq!(reporter.output("branch"), None);
    }

    #[tokio::test]
    async fn failed_pr_skips_assignment_and_pr_number() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), None, Some("monalisa"));

        let mut server = mockito::Server::new_async().await;
        let _pulls = server
            .mock("POST", "/repos/octo/widgets/pulls")
            .with_status(422)
            .with_body(r#"{"message":"No commits between main and head"}"#)
            .create_async()
            .await;
        let assign = server
            .mock("POST", Matcher::Regex(r"/assignees$".into()))
            .expect(0)
            .create_async()
            .await;

        let assistant = FakeAssistant::default();
        let reporter = RecordingReporter::default();
        let git = GitOps::new(ScriptedGit::with_codes(&[("diff-index", 0)]));
        let pipeline = Pipeline::new(&cfg, &assistant, git, github(&server), &reporter);

        let summary = pipeline.run().await.unwrap();

        assign.assert_async().await;
        assert_eq!(summary.pr_number, None);
        assert_eq!(summary.first_commit, CommitOutcome::NoChanges);
        assert!(reporter.output("branch").is_some());
        assert_eq!(reporter.output("pr_number"), None);
        assert_eq!(reporter.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn assistant_failure_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), None, None);

        let mut server = mockito::Server::new_async().await;
        let _pulls = pulls_ok(&mut server).await;

        let assistant = FakeAssistant::failing();
        let reporter = RecordingReporter::default();
        let git = GitOps::new(ScriptedGit::with_codes(&[("diff-index", 0)]));
        let pipeline = Pipeline::new(&cfg, &assistant, git, github(&server), &reporter);

        let summary = pipeline.run().await.unwrap();

        assert_eq!(assistant.calls(), 2);
        assert_eq!(summary.pr_number, Some(42));
        assert_eq!(summary.assignee, None);
        // No actor: assignment is skipped with a warning.
        assert!(reporter
            .warnings()
            .iter()
            .any(|w| w.contains("unassigned")));
    }

    #[tokio::test]
    async fn rejected_instruction_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("task.md"), "hi").unwrap();
        let cfg = config(dir.path(), Some("../task.md"), None);
        let server = mockito::Server::new_async().await;

        let assistant = FakeAssistant::default();
        let reporter = RecordingReporter::default();
        let git = GitOps::new(ScriptedGit::default());
        let pipeline = Pipeline::new(&cfg, &assistant, git, github(&server), &reporter);

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, DelegateError::PathTraversal(_)), "{err}");
        assert_eq!(assistant.calls(), 0);
    }

    #[test]
    fn pr_body_names_instruction_source() {
        let summary = RunSummary {
            branch: "b".into(),
            first_commit: CommitOutcome::Committed,
            review_commit: CommitOutcome::NoChanges,
            pr_number: None,
            pr_url: None,
            assignee: None,
        };
        let body = pr_body(&Instructions::default_prompt(), &summary);
        assert!(body.contains("Instructions: default prompt"));
        assert!(body.contains("Changes: committed"));
        assert!(body.contains("Documentation and review: none"));
    }
}
