mod output;
mod root;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use delegate_core::config::{DEFAULT_API_URL, DEFAULT_STARTUP_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};
use delegate_core::{
    ActionInput, ActionsReporter, AssistantSettings, CopilotAssistant, DelegateConfig,
    GitHubClient, GitHubContext, GitOps, Pipeline, Reporter, Repository, RunSummary, SystemGit,
};

#[derive(Parser)]
#[command(
    name = "copilot-delegate",
    about = "Run Copilot on the repository and open a pull request with its changes",
    version
)]
struct Cli {
    /// GitHub token for the API and the Copilot CLI
    #[arg(long, env = "INPUT_PRIVATE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Instruction file, relative to the workspace (default: built-in prompt)
    #[arg(long, env = "INPUT_FILENAME")]
    filename: Option<String>,

    /// Base branch for the pull request
    #[arg(long, env = "INPUT_BRANCH")]
    branch: Option<String>,

    /// Repository as `owner/name`
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// Login to assign the pull request to
    #[arg(long, env = "GITHUB_ACTOR")]
    actor: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Working tree (default: auto-detect from .git/)
    #[arg(long, env = "GITHUB_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// File that receives step outputs (default: stdout)
    #[arg(long, env = "GITHUB_OUTPUT")]
    output_file: Option<PathBuf>,

    /// Copilot CLI executable
    #[arg(long, env = "COPILOT_CLI_PATH")]
    copilot_path: Option<String>,

    /// Extra argument for the Copilot CLI (repeatable)
    #[arg(long = "copilot-arg", env = "COPILOT_CLI_ARGS", value_delimiter = ' ')]
    copilot_args: Vec<String>,

    /// Model for the Copilot session
    #[arg(long, env = "COPILOT_MODEL")]
    model: Option<String>,

    /// Upper bound on each Copilot run, in seconds
    #[arg(long, env = "COPILOT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// How long the Copilot CLI gets to answer its handshake, in seconds
    #[arg(long, env = "COPILOT_STARTUP_TIMEOUT_SECS", default_value_t = DEFAULT_STARTUP_TIMEOUT_SECS)]
    startup_timeout_secs: u64,

    /// Print the run summary as JSON
    #[arg(long, short = 'j')]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    // stdout carries workflow commands, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let reporter = ActionsReporter::new(cli.output_file.clone());

    if let Err(e) = run(cli, &reporter) {
        tracing::error!(error = %format!("{e:#}"), "delegate run failed");
        reporter.error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli, reporter: &ActionsReporter) -> anyhow::Result<()> {
    let json = cli.json;
    let config = build_config(cli)?;
    reporter.mask(config.input.token.expose());

    tracing::info!(
        repository = %config.github.repository,
        base = %config.input.base_branch,
        workspace = %config.github.workspace.display(),
        "starting delegate run"
    );

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let summary = rt.block_on(execute(&config, reporter))?;

    if json {
        output::print_json(&summary)?;
    } else {
        output::print_summary(&summary);
    }
    Ok(())
}

fn build_config(cli: Cli) -> anyhow::Result<DelegateConfig> {
    let input = ActionInput::new(cli.token, cli.filename, cli.branch)?;
    let repository: Repository = cli
        .repository
        .as_deref()
        .context("GITHUB_REPOSITORY is not set")?
        .parse()?;
    let workspace = root::resolve_workspace(cli.workspace.as_deref());

    Ok(DelegateConfig {
        input,
        github: GitHubContext {
            repository,
            actor: cli.actor.filter(|a| !a.trim().is_empty()),
            api_url: cli.api_url,
            workspace,
            output_file: cli.output_file,
        },
        assistant: AssistantSettings {
            cli_path: cli.copilot_path,
            cli_args: cli.copilot_args,
            model: cli.model,
            timeout: Duration::from_secs(cli.timeout_secs),
            startup_timeout: Duration::from_secs(cli.startup_timeout_secs),
        },
    })
}

async fn execute(config: &DelegateConfig, reporter: &dyn Reporter) -> anyhow::Result<RunSummary> {
    let assistant = CopilotAssistant::new(
        config.input.token.clone(),
        config.assistant.clone(),
        &config.github.workspace,
    );
    let git = GitOps::new(SystemGit::new(&config.github.workspace));
    let github = GitHubClient::new(
        &config.github.api_url,
        config.github.repository.clone(),
        config.input.token.clone(),
    )
    .context("failed to build GitHub client")?;

    let summary = Pipeline::new(config, assistant, git, github, reporter)
        .run()
        .await?;
    Ok(summary)
}
