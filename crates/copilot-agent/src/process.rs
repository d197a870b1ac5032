use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::framing::MessageReader;
use crate::types::ClientOptions;
use crate::{CopilotAgentError, Result};

// ─── CopilotProcess ───────────────────────────────────────────────────────

/// A running `copilot --headless --stdio` subprocess.
///
/// JSON-RPC messages travel over stdin and stdout with `Content-Length`
/// framing (see [`crate::framing`]). Stderr is captured in a background task and surfaced
/// on process exit errors.
pub(crate) struct CopilotProcess {
    child: Child,
    stdout: Option<MessageReader<BufReader<ChildStdout>>>,
    stdin: Option<ChildStdin>,
    /// Stderr output collected by a background reader task.
    stderr_buf: Arc<Mutex<String>>,
}

impl CopilotProcess {
    /// Spawn the CLI described by `opts`.
    pub(crate) fn spawn(opts: &ClientOptions) -> Result<Self> {
        let mut cmd = build_command(opts);
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }
        Self::from_command(cmd)
    }

    fn from_command(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(CopilotAgentError::Io)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CopilotAgentError::Process("stdout not captured".into()))?;

        let stdin = child.stdin.take();

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            });
        }

        Ok(Self {
            child,
            stdout: Some(MessageReader::new(BufReader::new(stdout))),
            stdin,
            stderr_buf,
        })
    }

    /// Hand the stdout message reader to the connection's reader task.
    pub(crate) fn take_stdout(&mut self) -> Option<MessageReader<BufReader<ChildStdout>>> {
        self.stdout.take()
    }

    pub(crate) fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// `true` once the child has exited.
    pub(crate) fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait up to `grace` for a clean exit, killing the child afterwards.
    ///
    /// Returns an error if the exit code is non-zero.
    pub(crate) async fn shutdown(&mut self, grace: Duration) -> Result<()> {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(self.exit_error(status.code())),
            Ok(Err(e)) => Err(CopilotAgentError::Io(e)),
            Err(_) => {
                tracing::warn!(grace_secs = grace.as_secs(), "copilot CLI did not exit, killing");
                self.kill().await
            }
        }
    }

    fn exit_error(&self, code: Option<i32>) -> CopilotAgentError {
        let stderr = self.stderr();
        let head = match code {
            Some(code) => format!("Copilot CLI exited with code {code}"),
            None => "Copilot CLI terminated by signal".to_string(),
        };
        if stderr.is_empty() {
            CopilotAgentError::Process(head)
        } else {
            CopilotAgentError::Process(format!("{head}\nstderr: {stderr}"))
        }
    }

    pub(crate) fn stderr(&self) -> String {
        self.stderr_buf
            .lock()
            .ok()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Kill the subprocess and reap it.
    pub(crate) async fn kill(&mut self) -> Result<()> {
        if self.has_exited() {
            return Ok(());
        }
        self.child.kill().await.map_err(CopilotAgentError::Io)
    }
}

// ─── Command builder ──────────────────────────────────────────────────────

fn build_command(opts: &ClientOptions) -> Command {
    let exe = opts.cli_path.as_deref().unwrap_or("copilot");
    let mut cmd = Command::new(exe);

    cmd.args(&opts.cli_args);
    cmd.arg("--headless").arg("--stdio");

    if let Some(level) = &opts.log_level {
        cmd.arg("--log-level").arg(level);
    }

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    cmd
}
