use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CopilotAgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON-RPC message: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("JSON-RPC error {code} from '{method}': {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Timed out after {}s waiting for the Copilot CLI", .0.as_secs())]
    Timeout(Duration),
}
