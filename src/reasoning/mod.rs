//! Reasoning-call collaborator interface
//!
//! Planning, verification, classification, and synthesis are all delegated
//! to an external language model behind one narrow trait. The model is a
//! pluggable, possibly-nondeterministic collaborator: callers never assume
//! repeatable output and parse its structured responses defensively.

use crate::Result;
use async_trait::async_trait;

pub mod gemini;
pub use gemini::GeminiModel;

/// Which part of the pipeline is asking. Implementations may vary sampling
/// settings per role (classification and verification want determinism,
/// synthesis wants some freedom).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningRole {
    Classification,
    Planning,
    Verification,
    Analysis,
    Synthesis,
}

/// Trait for a reasoning call: role + context in, free text out.
/// Structured output (plans, verdicts) is parsed by the caller.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, role: ReasoningRole, system: &str, prompt: &str) -> Result<String>;
}

/// Strip markdown code fences the model may wrap JSON in, then slice to the
/// outermost `{ ... }` object if extra prose surrounds it.
pub fn extract_json_object(response: &str) -> &str {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text = text.trim();

    if !text.starts_with('{') {
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if end > start {
                return &text[start..=end];
            }
        }
    }
    text
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let raw = "```json\n{\"verdict\": \"accept\"}\n```";
        assert_eq!(extract_json_object(raw), "{\"verdict\": \"accept\"}");
    }

    #[test]
    fn extracts_embedded_json() {
        let raw = "Here is the plan:\n{\"steps\": []}\nHope that helps.";
        assert_eq!(extract_json_object(raw), "{\"steps\": []}");
    }

    #[test]
    fn passes_through_plain_json() {
        let raw = "{\"steps\": []}";
        assert_eq!(extract_json_object(raw), raw);
    }
}
