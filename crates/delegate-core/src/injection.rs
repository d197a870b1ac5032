use regex::Regex;
use std::sync::OnceLock;

/// Share of structural characters (`< > { } [ ]`) above which text is rejected.
pub const MAX_SPECIAL_CHAR_RATIO: f64 = 0.10;

/// Outcome of [`detect_prompt_injection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionCheck {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl InjectionCheck {
    fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

// Evaluated in order; the first hit wins.
const PATTERNS: &[(&str, &str)] = &[
    (
        r"(?i)\b(ignore|disregard|forget)\s+(all\s+|any\s+|the\s+)?(previous|prior|above|earlier)\s+(instructions|prompts|commands)\b",
        "attempt to override previous instructions",
    ),
    (r"(?i)\bnew\s+instructions\s*:", "injected replacement instructions"),
    (r"(?i)\b(system|admin)\s+prompt\s*:", "injected system prompt"),
    (r"(?i)\byou\s+are\s+now\s+(a|an)\b", "attempt to reassign the assistant's role"),
    (r"(?i)\bfrom\s+now\s+on\s+you\s+(are|will)\b", "attempt to reassign the assistant's role"),
    (r"(?i)\[(system|admin|override)\]", "privileged bracket marker"),
    (r"(?i)<\s*(system|admin)\s*>", "privileged tag marker"),
];

static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

fn compiled() -> &'static [(Regex, &'static str)] {
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|(pattern, reason)| (Regex::new(pattern).unwrap(), *reason))
            .collect()
    })
}

/// Screen free-text instructions before they reach the assistant.
pub fn detect_prompt_injection(text: &str) -> InjectionCheck {
    if text.trim().is_empty() {
        return InjectionCheck::invalid("instructions must be a non-empty string");
    }

    if let Some((_, reason)) = compiled().iter().find(|(re, _)| re.is_match(text)) {
        tracing::warn!(reason, "prompt injection pattern matched");
        return InjectionCheck::invalid(*reason);
    }

    let total = text.chars().count();
    let special = text
        .chars()
        .filter(|c| matches!(c, '<' | '>' | '{' | '}' | '[' | ']'))
        .count();
    if special as f64 / total as f64 > MAX_SPECIAL_CHAR_RATIO {
        tracing::warn!(special, total, "special character density too high");
        return InjectionCheck::invalid(format!(
            "excessive special characters ({special} of {total})"
        ));
    }

    InjectionCheck::valid()
}
