use regex::Regex;

/// Phrases commonly used to override the system prompt.
pub const DEFAULT_INJECTION_PATTERNS: &[&str] = &[
    r"ignore\s+previous\s+instructions",
    r"ignore\s+all\s+previous\s+prompts",
    r"disregard\s+your\s+instructions",
];

pub const FILTERED_PLACEHOLDER: &str = "[FILTERED]";

/// Replaces prompt-injection phrases in outgoing user text.
#[derive(Debug, Clone)]
pub struct PromptSanitizer {
    patterns: Vec<Regex>,
}

impl PromptSanitizer {
    /// Build a sanitizer from regex patterns, matched case-insensitively.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(&format!("(?i){}", p.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the sanitized text and how many phrases were replaced.
    pub fn sanitize(&self, text: &str) -> (String, usize) {
        let mut result = text.to_string();
        let mut detections = 0;

        for pattern in &self.patterns {
            let found = pattern.find_iter(&result).count();
            if found == 0 {
                continue;
            }
            log::warn!(
                "Potential prompt injection detected ({} match(es) for /{}/)",
                found,
                pattern.as_str()
            );
            detections += found;
            result = pattern
                .replace_all(&result, FILTERED_PLACEHOLDER)
                .into_owned();
        }

        (result, detections)
    }
}

impl Default for PromptSanitizer {
    fn default() -> Self {
        let patterns = DEFAULT_INJECTION_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
            .collect();
        Self { patterns }
    }
}
