use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use crate::permission::PermissionHandler;

// ─── JSON-RPC envelopes ───────────────────────────────────────────────────

/// Outgoing request written to the CLI's stdin as one framed message.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Every message the CLI writes to stdout.
///
/// Variant order matters for `untagged`: a server request carries both `id`
/// and `method`, a response only `id`, a notification only `method`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Incoming {
    Request {
        id: serde_json::Value,
        method: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    Response {
        id: u64,
        #[serde(default)]
        result: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<RpcError>,
    },
    Notification {
        method: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

// ─── Session events ───────────────────────────────────────────────────────

/// Params of a `session.event` notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionEventParams {
    pub session_id: String,
    pub event: SessionEvent,
}

/// Events streamed by a session while it works on a message.
/// Discriminated by the JSON `"type"` field.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    #[serde(rename = "tool.execution_start")]
    ToolExecutionStart { data: ToolExecutionStart },
    #[serde(rename = "tool.execution_complete")]
    ToolExecutionComplete { data: ToolExecutionComplete },
    /// Partial assistant text, only emitted on streaming sessions.
    #[serde(rename = "assistant.message_delta")]
    AssistantMessageDelta { data: AssistantMessageDelta },
    #[serde(rename = "assistant.message")]
    AssistantMessage { data: AssistantMessage },
    #[serde(rename = "session.error")]
    SessionError { data: SessionErrorData },
    /// The session finished processing the last message.
    #[serde(rename = "session.idle")]
    SessionIdle,
    /// Any event type this crate does not know yet.
    #[serde(other)]
    Unknown,
}

impl SessionEvent {
    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::ToolExecutionStart { .. } => "tool.execution_start",
            SessionEvent::ToolExecutionComplete { .. } => "tool.execution_complete",
            SessionEvent::AssistantMessageDelta { .. } => "assistant.message_delta",
            SessionEvent::AssistantMessage { .. } => "assistant.message",
            SessionEvent::SessionError { .. } => "session.error",
            SessionEvent::SessionIdle => "session.idle",
            SessionEvent::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionStart {
    #[serde(default)]
    pub tool_call_id: Option<String>,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionComplete {
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default = "default_true")]
    pub success: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessageDelta {
    #[serde(default)]
    pub message_id: Option<String>,
    pub delta_content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionErrorData {
    #[serde(default)]
    pub error_type: Option<String>,
    pub message: String,
}

// ─── Permission requests ──────────────────────────────────────────────────

/// Params of a server-initiated `permission.request`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PermissionRequestParams {
    pub session_id: String,
    pub permission_request: PermissionRequest,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub kind: PermissionKind,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Shell,
    Write,
    Read,
    Url,
    Mcp,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PermissionDecision {
    Approved,
    DeniedByRules,
    DeniedInteractivelyByUser,
}

// ─── Options ──────────────────────────────────────────────────────────────

pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// How to launch and supervise the CLI process.
#[derive(Clone)]
pub struct ClientOptions {
    /// Executable to spawn. Defaults to `copilot` on `PATH`.
    pub cli_path: Option<String>,
    /// Extra arguments placed before `--headless --stdio`.
    pub cli_args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra environment for the child. Credentials travel here, never as args.
    pub env: HashMap<String, String>,
    pub log_level: Option<String>,
    /// Start the process on the first `create_session` if not started yet.
    pub auto_start: bool,
    /// Respawn the process before a call if it has exited.
    pub auto_restart: bool,
    /// Bound on the startup `ping` and on `session.create`.
    pub startup_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            cli_path: None,
            cli_args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            log_level: None,
            auto_start: true,
            auto_restart: true,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

/// Env values are credentials; only their names are printed.
impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env: BTreeMap<&str, &str> = self.env.keys().map(|k| (k.as_str(), "***")).collect();
        f.debug_struct("ClientOptions")
            .field("cli_path", &self.cli_path)
            .field("cli_args", &self.cli_args)
            .field("cwd", &self.cwd)
            .field("env", &env)
            .field("log_level", &self.log_level)
            .field("auto_start", &self.auto_start)
            .field("auto_restart", &self.auto_restart)
            .field("startup_timeout", &self.startup_timeout)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct SessionConfig {
    pub model: Option<String>,
    /// Emit `assistant.message_delta` events while the reply is generated.
    pub streaming: bool,
    /// Decides server permission requests. `None` denies everything.
    pub permission_handler: Option<PermissionHandler>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("model", &self.model)
            .field("streaming", &self.streaming)
            .field("permission_handler", &self.permission_handler.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOptions {
    pub prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl MessageOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self.attachments.push(Attachment::File { path, display_name });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    #[serde(rename_all = "camelCase")]
    File {
        path: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
}
