//! Step verification
//!
//! After every execution the verifier judges the step result against the
//! original query, not merely the step's own description: completeness of
//! expected fields, plausibility of values, relevance to the original
//! intent, and capability-level errors. The verdict drives the control
//! loop: accept, retry with an adjusted step, or abandon the plan.

use crate::models::{
    Plan, StepDescriptor, StepResult, VerdictKind, Verification,
};
use crate::reasoning::{extract_json_object, LanguageModel, ReasoningRole};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const VERIFICATION_SYSTEM: &str =
    "You are a meticulous financial data quality verification expert. \
     Evaluate the step result thoroughly. Return only valid JSON.";

const VERIFICATION_PROMPT: &str = r#"Verify whether a step in a financial analysis pipeline produced a GOOD, ACCURATE, and COMPLETE result.

ORIGINAL USER QUERY: "{query}"

FULL PLAN:
{plan_summary}

CURRENT STEP BEING VERIFIED:
  Step id: {step_id}
  Description: {step_description}
  Kind: {step_kind}
  Capability: {capability}
  Parameters: {parameters}

STEP RESULT:
{step_result}

PREVIOUS STEP RESULTS (for context):
{previous_results}

Times this step was retried so far: {retry_count}

Perform a thorough quality check:
1. Completeness: does the result contain the data this step was meant to produce?
2. Plausibility: do the values look reasonable (positive prices, sane ranges, recent dates)?
3. Relevance: does this result actually help answer the ORIGINAL query? Right company, right period, right metric?
4. Errors: explicit error messages, empty data where data was expected, timeouts.

Return a JSON object with ONE of these verdicts:

Result is good:
{"verdict": "accept", "explanation": "why this result passes"}

Result needs a retry with adjusted parameters (fixable problem):
{"verdict": "retry", "explanation": "what is wrong", "retry_step": {"id": "{step_id}", "description": "...", "kind": "{step_kind}", "capability": "exact_capability_name", "parameters": {...}, "dependencies": [...]}}

The plan itself targets the wrong subject or approach:
{"verdict": "abandon", "explanation": "what is fundamentally wrong", "abandon_reason": "why the plan needs to be redesigned"}

RULES:
- Only "abandon" when the APPROACH is wrong (wrong company, wrong capabilities), not when data is slightly incomplete
- For "retry", retry_step must keep the same id and provide complete corrected parameters
- Partial data is acceptable when it is enough to answer the query

Return ONLY valid JSON, no additional text."#;

/// Trait for judging one step result. Infallible by contract: a judgment
/// failure degrades to accept rather than blocking the loop.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(
        &self,
        query: &str,
        plan: &Plan,
        step: &StepDescriptor,
        result: &StepResult,
        results: &HashMap<String, StepResult>,
        retry_count: u32,
    ) -> Verification;
}

pub struct LlmVerifier {
    model: Arc<dyn LanguageModel>,
}

impl LlmVerifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn build_prompt(
        query: &str,
        plan: &Plan,
        step: &StepDescriptor,
        result: &StepResult,
        results: &HashMap<String, StepResult>,
        retry_count: u32,
    ) -> String {
        let plan_summary = plan
            .steps
            .iter()
            .map(|s| format!("  {} ({}): {}", s.id, s.kind, s.description))
            .collect::<Vec<_>>()
            .join("\n");

        let mut previous = String::new();
        for (id, prev) in results {
            if id == &step.id {
                continue;
            }
            previous.push_str(&format!(
                "  {} ({}): {}\n",
                id,
                prev.kind,
                truncate(&prev.prompt_text(), 500)
            ));
            if previous.len() > 2000 {
                break;
            }
        }
        if previous.is_empty() {
            previous.push_str("  (no previous results yet)");
        }

        VERIFICATION_PROMPT
            .replace("{query}", query)
            .replace("{plan_summary}", &plan_summary)
            .replace("{step_id}", &step.id)
            .replace("{step_description}", &step.description)
            .replace("{step_kind}", &step.kind.to_string())
            .replace(
                "{capability}",
                step.capability.as_deref().unwrap_or("n/a (ANALYSIS step)"),
            )
            .replace("{parameters}", &step.parameters.to_string())
            .replace("{step_result}", &truncate(&result.prompt_text(), 3000))
            .replace("{previous_results}", &previous)
            .replace("{retry_count}", &retry_count.to_string())
    }

    /// Parse the model's verdict defensively. Anything malformed degrades
    /// to accept so a bad judgment never blocks the loop.
    fn parse_verdict(step: &StepDescriptor, response: &str) -> Verification {
        let cleaned = extract_json_object(response);
        let mut verification: Verification = match serde_json::from_str(cleaned) {
            Ok(v) => v,
            Err(e) => {
                return Verification::accept(format!(
                    "Verification response could not be parsed ({}); proceeding",
                    e
                ));
            }
        };

        match verification.verdict {
            VerdictKind::Retry => match verification.retry_step.as_mut() {
                Some(retry_step) => {
                    // The adjusted step must keep the judged step's identity
                    // and position in the dependency graph.
                    retry_step.id = step.id.clone();
                    retry_step.kind = step.kind;
                    retry_step.dependencies = step.dependencies.clone();
                    verification
                }
                None => Verification::accept(
                    "retry verdict without a retry step; proceeding with available data",
                ),
            },
            VerdictKind::Abandon => {
                if verification.abandon_reason.is_none() {
                    verification.abandon_reason = Some(verification.explanation.clone());
                }
                verification
            }
            VerdictKind::Accept => verification,
        }
    }
}

#[async_trait]
impl Verifier for LlmVerifier {
    async fn verify(
        &self,
        query: &str,
        plan: &Plan,
        step: &StepDescriptor,
        result: &StepResult,
        results: &HashMap<String, StepResult>,
        retry_count: u32,
    ) -> Verification {
        // The synthesis step is terminal: it is never retried and never
        // triggers abandonment.
        if step.is_synthesis() {
            let explanation = match result.analysis.as_deref() {
                Some(text) if !text.trim().is_empty() => "synthesis produced an answer",
                _ => "synthesis returned no text; surfacing best available results",
            };
            return Verification::accept(explanation);
        }

        let prompt = Self::build_prompt(query, plan, step, result, results, retry_count);

        let verification = match self
            .model
            .generate(ReasoningRole::Verification, VERIFICATION_SYSTEM, &prompt)
            .await
        {
            Ok(response) => Self::parse_verdict(step, &response),
            Err(e) => {
                warn!(step_id = %step.id, error = %e, "Verification call failed, accepting");
                Verification::accept(format!("Verification call failed ({}); proceeding", e))
            }
        };

        debug!(
            step_id = %step.id,
            verdict = %verification.verdict,
            "Step verified"
        );
        verification
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}
