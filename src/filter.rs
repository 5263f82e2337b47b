//! Prompt content filter: rejects instruction or style text containing
//! disallowed terms before a job is admitted

use regex::Regex;

use crate::error::{AppError, Result};

pub const DEFAULT_BLOCKED_TERMS: &[&str] =
    &["nude", "naked", "topless", "nsfw", "deepfake", "fake"];

/// Configuration for the prompt filter
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub enabled: bool,
    pub blocked_terms: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_terms: DEFAULT_BLOCKED_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Case-insensitive blocked-term matcher with ASCII word boundaries, so
/// "topless," is caught while "fakery" is not
pub struct PromptFilter {
    enabled: bool,
    patterns: Vec<(String, Regex)>,
}

impl PromptFilter {
    pub fn new(config: FilterConfig) -> Result<Self> {
        let mut patterns = Vec::new();
        for raw_term in &config.blocked_terms {
            let term = raw_term.trim().to_lowercase();
            if term.is_empty() {
                continue;
            }

            // Letters and digits are word characters; everything else is a
            // boundary, which also catches punctuation like "term," or "(term)"
            let pattern = format!(
                r"(?i)(?:^|[^a-z0-9]){}(?:$|[^a-z0-9])",
                regex::escape(&term)
            );
            let regex = Regex::new(&pattern)
                .map_err(|e| AppError::Internal(format!("invalid blocked term pattern: {}", e)))?;
            patterns.push((term, regex));
        }

        Ok(Self {
            enabled: config.enabled,
            patterns,
        })
    }

    /// All blocked terms found in the given text, sorted and deduplicated
    pub fn find_blocked(&self, text: &str) -> Vec<String> {
        let haystack = text.trim();
        if !self.enabled || haystack.is_empty() {
            return Vec::new();
        }

        let mut found: Vec<String> = self
            .patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(haystack))
            .map(|(term, _)| term.clone())
            .collect();
        found.sort();
        found.dedup();
        found
    }

    /// Check instruction and optional style text; rejects with `PromptBlocked`
    /// listing every matched term
    pub fn check(&self, instruction: &str, style_prompt: Option<&str>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut found = self.find_blocked(instruction);
        if let Some(style) = style_prompt {
            found.extend(self.find_blocked(style));
        }
        found.sort();
        found.dedup();

        if found.is_empty() {
            Ok(())
        } else {
            Err(AppError::PromptBlocked(format!(
                "prompt contains blocked terms: {}",
                found.join(", ")
            )))
        }
    }
}
