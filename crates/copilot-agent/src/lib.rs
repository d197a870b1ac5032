//! `copilot-agent`: native Rust driver for the Copilot CLI in headless mode.
//!
//! The CLI is spawned with `--headless --stdio` and spoken to with
//! `Content-Length` framed JSON-RPC 2.0, so callers do not need a Node.js runtime.
//!
//! # Architecture
//!
//! ```text
//! ClientOptions
//!     │
//!     ▼
//! CopilotProcess  ← spawns `copilot --headless --stdio`, drains stderr
//!     │
//!     ▼
//! Connection      ← request/response correlation by id, one reader task
//!     │              routes session events and permission requests
//!     ▼
//! Session         ← send / send_and_wait / destroy
//!     │
//!     ▼
//! SessionEvents   ← futures::Stream<Item = SessionEvent>
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use copilot_agent::{runner, ClientOptions, CopilotClient, MessageOptions, SessionConfig};
//!
//! let mut client = CopilotClient::new(ClientOptions::default());
//! let result = runner::run(
//!     &mut client,
//!     runner::RunConfig {
//!         session: SessionConfig {
//!             streaming: true,
//!             permission_handler: Some(copilot_agent::approve_all_handler()),
//!             ..Default::default()
//!         },
//!         message: MessageOptions::new("Add a README section on testing."),
//!         timeout: runner::DEFAULT_TIMEOUT,
//!     },
//!     |event| println!("{}", event.kind()),
//! )
//! .await?;
//! ```

pub mod client;
pub mod error;
pub mod permission;
pub mod runner;
pub mod session;
pub mod stream;
pub mod types;

pub(crate) mod connection;
pub(crate) mod framing;
pub(crate) mod process;


pub use client::CopilotClient;
pub use error::CopilotAgentError;
pub use permission::{approve_all, approve_all_handler, PermissionHandler};
pub use runner::{run as agent_run, RunConfig, RunResult};
pub use session::Session;
pub use stream::SessionEvents;
pub use types::{
    AssistantMessage, AssistantMessageDelta, Attachment, ClientOptions, MessageOptions,
    PermissionDecision, PermissionKind, PermissionRequest, RpcError, SessionConfig,
    SessionErrorData, SessionEvent, ToolExecutionComplete, ToolExecutionStart,
    DEFAULT_STARTUP_TIMEOUT,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, CopilotAgentError>;
