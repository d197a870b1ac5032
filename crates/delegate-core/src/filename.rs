use crate::error::{DelegateError, Result};

pub const MAX_FILENAME_LEN: usize = 255;

/// Characters replaced by [`SUBSTITUTE`] during sanitization.
const DISALLOWED: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
const SUBSTITUTE: char = '_';

/// Validate and sanitize a user-supplied instruction filename.
///
/// Length, absolute-path and traversal checks run on the raw input, before
/// any substitution, so sanitization can never launder a rejected name.
/// Nested relative paths (`docs/task.md`) are allowed; each component is
/// sanitized separately.
pub fn validate_filename(raw: &str) -> Result<String> {
    let len = raw.chars().count();
    if len == 0 || len > MAX_FILENAME_LEN {
        return Err(DelegateError::FilenameLength(len));
    }
    if is_absolute(raw) {
        return Err(DelegateError::AbsolutePath(raw.to_string()));
    }
    if raw.contains("..") {
        return Err(DelegateError::PathTraversal(raw.to_string()));
    }

    let sanitized = sanitize(raw);
    if sanitized != raw {
        tracing::warn!(original = %raw, sanitized = %sanitized, "filename was sanitized");
    }
    Ok(sanitized)
}

fn is_absolute(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }
    // Windows drive root: `C:\...` or `C:/...`. A bare `C:` is sanitized.
    let mut chars = raw.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(drive), Some(':'), Some('/' | '\\')) if drive.is_ascii_alphabetic()
    )
}

fn sanitize(raw: &str) -> String {
    raw.split(['/', '\\'])
        .map(|component| {
            component
                .chars()
                .map(|c| {
                    if DISALLOWED.contains(&c) || c.is_control() {
                        SUBSTITUTE
                    } else {
                        c
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/")
}
