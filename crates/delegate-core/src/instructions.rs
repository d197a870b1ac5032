use std::path::PathBuf;

/// Prompt used when no instruction file is given.
pub const DEFAULT_PROMPT: &str = "Review the repository and implement the improvements and \
fixes you find most valuable. Keep the changes focused and consistent with the existing code \
style, and make sure the project still builds and its tests pass.";

/// Prompt for the second pass on the same branch.
pub const REVIEW_PROMPT: &str = "Review the changes made on the current branch. Update the \
documentation (README, doc comments, changelog) so it matches the new behaviour, and fix any \
problems you find in the changes themselves.";

/// Text handed to the assistant, plus the file it came from if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instructions {
    pub text: String,
    pub source_file: Option<PathBuf>,
}

impl Instructions {
    pub fn default_prompt() -> Self {
        Self {
            text: DEFAULT_PROMPT.to_string(),
            source_file: None,
        }
    }

    pub fn review() -> Self {
        Self {
            text: REVIEW_PROMPT.to_string(),
            source_file: None,
        }
    }

    /// Human-readable origin, used in the pull request body.
    pub fn source_label(&self) -> String {
        match &self.source_file {
            Some(path) => match path.file_name() {
                Some(name) => format!("`{}`", name.to_string_lossy()),
                None => format!("`{}`", path.display()),
            },
            None => "default prompt".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::detect_prompt_injection;

    #[test]
    fn built_in_prompts_pass_the_injection_filter() {
        assert!(detect_prompt_injection(DEFAULT_PROMPT).is_valid);
        assert!(detect_prompt_injection(REVIEW_PROMPT).is_valid);
    }

    #[test]
    fn source_label_uses_file_name() {
        let i = Instructions {
            text: "x".into(),
            source_file: Some(PathBuf::from("/work/docs/task.md")),
        };
        assert_eq!(i.source_label(), "`task.md`");
        assert_eq!(Instructions::default_prompt().source_label(), "default prompt");
    }
}
