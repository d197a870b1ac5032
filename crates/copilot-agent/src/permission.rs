use std::sync::Arc;

use crate::types::{PermissionDecision, PermissionRequest};

/// Decides a permission request raised by the CLI while a session works.
///
/// Handlers are plain functions of the request so they can be unit tested
/// without a running process.
pub type PermissionHandler = Arc<dyn Fn(&PermissionRequest) -> PermissionDecision + Send + Sync>;

/// Approve every request, including kinds this crate does not model.
///
/// Unattended runs rely on the human review of the resulting pull request
/// instead of per-action approval.
pub fn approve_all(request: &PermissionRequest) -> PermissionDecision {
    tracing::debug!(kind = ?request.kind, tool_call = ?request.tool_call_id, "approving permission request");
    PermissionDecision::Approved
}

/// Handler wrapping [`approve_all`].
pub fn approve_all_handler() -> PermissionHandler {
    Arc::new(approve_all)
}

pub(crate) fn decide(
    handler: Option<&PermissionHandler>,
    request: &PermissionRequest,
) -> PermissionDecision {
    match handler {
        Some(h) => h(request),
        None => PermissionDecision::DeniedByRules,
    }
}
