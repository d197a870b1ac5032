use std::io::Write;
use std::path::PathBuf;

/// Run-scoped sink for user-facing annotations and step outputs.
///
/// One instance is built per run and passed to every component, so nothing
/// writes workflow commands through global state.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn set_output(&self, name: &str, value: &str);
    /// Ask the runner to redact `secret` from all later log output.
    fn mask(&self, secret: &str);
}

// ---------------------------------------------------------------------------
// ActionsReporter
// ---------------------------------------------------------------------------

/// GitHub Actions workflow commands on stdout, outputs in `$GITHUB_OUTPUT`.
///
/// Without an output file, outputs are printed as `name=value` lines.
#[derive(Debug, Clone, Default)]
pub struct ActionsReporter {
    output_file: Option<PathBuf>,
}

impl ActionsReporter {
    pub fn new(output_file: Option<PathBuf>) -> Self {
        Self { output_file }
    }

    fn append_output(&self, line: &str) -> std::io::Result<()> {
        match &self.output_file {
            Some(path) => {
                let mut f = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                writeln!(f, "{line}")
            }
            None => {
                println!("{line}");
                Ok(())
            }
        }
    }
}

impl Reporter for ActionsReporter {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn warning(&self, message: &str) {
        println!("::warning::{}", escape_data(message));
    }

    fn error(&self, message: &str) {
        println!("::error::{}", escape_data(message));
    }

    fn set_output(&self, name: &str, value: &str) {
        tracing::debug!(name, value, "setting step output");
        if let Err(e) = self.append_output(&format_output(name, value)) {
            tracing::error!(name, error = %e, "failed to write step output");
        }
    }

    fn mask(&self, secret: &str) {
        if !secret.is_empty() {
            println!("::add-mask::{}", escape_data(secret));
        }
    }
}

/// Escape a workflow command payload the way the runner expects.
fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Single-line values use `name=value`; anything with a newline uses the
/// heredoc form.
fn format_output(name: &str, value: &str) -> String {
    if value.contains('\n') {
        format!("{name}<<__DELEGATE_EOF__\n{value}\n__DELEGATE_EOF__")
    } else {
        format!("{name}={value}")
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter (tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) use recording::RecordingReporter;


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn outputs_are_appended_to_output_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "existing=1\n").unwrap();

        let reporter = ActionsReporter::new(Some(path.clone()));
        reporter.set_output("branch", "copilot/delegate-2026-10-19T08-15-30-123Z");
        reporter.set_output("pr_number", "42");

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "existing=1\nbranch=copilot/delegate-2026-10-19T08-15-30-123Z\npr_number=42\n"
        );
    }

    #[test]
    fn multiline_output_uses_heredoc() {
        assert_eq!(
            format_output("body", "a\nb"),
            "body<<__DELEGATE_EOF__\na\nb\n__DELEGATE_EOF__"
        );
    }

    #[test]
    fn command_data_is_escaped() {
        assert_eq!(escape_data("50% done\r\nnext"), "50%25 done%0D%0Anext");
    }
}
