//! Assistant runner facade over `copilot-agent`.
//!
//! [`run_copilot`] screens the instructions, drives one Copilot session to
//! completion and turns any failure into a reporter warning plus an error.
//! The pipeline talks to it through the [`Assistant`] trait so it can be
//! replaced in tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use copilot_agent::{
    agent_run, approve_all_handler, ClientOptions, CopilotClient, MessageOptions, RunConfig,
    SessionConfig, SessionEvent,
};
use tracing::{debug, info, warn};

use crate::config::{AssistantSettings, Token};
use crate::error::{DelegateError, Result};
use crate::injection::detect_prompt_injection;
use crate::instructions::Instructions;
use crate::reporter::Reporter;

/// Something that can apply instructions to the working tree.
#[allow(async_fn_in_trait)]
pub trait Assistant {
    async fn run(&self, instructions: &Instructions, reporter: &dyn Reporter) -> Result<()>;
}

/// The Copilot CLI, run in the workflow's working directory.
#[derive(Debug, Clone)]
pub struct CopilotAssistant {
    token: Token,
    settings: AssistantSettings,
    workdir: PathBuf,
}

impl CopilotAssistant {
    pub fn new(token: Token, settings: AssistantSettings, workdir: impl Into<PathBuf>) -> Self {
        Self {
            token,
            settings,
            workdir: workdir.into(),
        }
    }
}

impl Assistant for CopilotAssistant {
    async fn run(&self, instructions: &Instructions, reporter: &dyn Reporter) -> Result<()> {
        run_copilot(
            &self.token,
            instructions,
            &self.settings,
            &self.workdir,
            reporter,
        )
        .await
    }
}

/// Run one Copilot session over `instructions`.
///
/// Instructions that fail the injection filter are rejected before any
/// process is started. Any later failure is logged, reported as a warning
/// and returned as [`DelegateError::Assistant`]; the client has been
/// force-stopped by then.
pub async fn run_copilot(
    token: &Token,
    instructions: &Instructions,
    settings: &AssistantSettings,
    workdir: &Path,
    reporter: &dyn Reporter,
) -> Result<()> {
    let check = detect_prompt_injection(&instructions.text);
    if !check.is_valid {
        let reason = check.reason.unwrap_or_default();
        return Err(DelegateError::PromptInjection(reason));
    }

    let mut client = CopilotClient::new(client_options(token, settings, workdir));
    let mut message = MessageOptions::new(instructions.text.as_str());
    if let Some(path) = &instructions.source_file {
        message = message.with_file(path);
    }
    let config = RunConfig {
        session: SessionConfig {
            model: settings.model.clone(),
            streaming: true,
            permission_handler: Some(approve_all_handler()),
        },
        message,
        timeout: settings.timeout,
    };

    info!(
        source = %instructions.source_label(),
        timeout_secs = settings.timeout.as_secs(),
        "running copilot"
    );
    match agent_run(&mut client, config, log_event).await {
        Ok(result) => {
            info!(
                session = %result.session_id,
                tool_calls = result.tool_calls,
                replied = result.reply.is_some(),
                "copilot run finished"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "copilot run failed");
            let err = DelegateError::Assistant(e);
            reporter.warning(&err.to_string());
            Err(err)
        }
    }
}

fn client_options(token: &Token, settings: &AssistantSettings, workdir: &Path) -> ClientOptions {
    let env = HashMap::from([
        ("GITHUB_TOKEN".to_string(), token.expose().to_string()),
        ("COPILOT_GITHUB_TOKEN".to_string(), token.expose().to_string()),
    ]);
    ClientOptions {
        cli_path: settings.cli_path.clone(),
        cli_args: settings.cli_args.clone(),
        cwd: Some(workdir.to_path_buf()),
        env,
        auto_start: true,
        auto_restart: true,
        startup_timeout: settings.startup_timeout,
        ..Default::default()
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::ToolExecutionStart { data } => {
            info!(tool = %data.tool_name, "tool started")
        }
        SessionEvent::ToolExecutionComplete { data } => info!(
            tool = data.tool_name.as_deref().unwrap_or("unknown"),
            success = data.success,
            "tool finished"
        ),
        SessionEvent::AssistantMessageDelta { data } => {
            debug!(delta = %data.delta_content, "message delta")
        }
        SessionEvent::AssistantMessage { data } => {
            info!(chars = data.content.len(), "assistant message")
        }
        SessionEvent::SessionError { data } => warn!(
            kind = data.error_type.as_deref().unwrap_or("unknown"),
            message = %data.message,
            "session error"
        ),
        other => debug!(event = other.kind(), "session event"),
    }
}
