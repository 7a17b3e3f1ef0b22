//! Core data model: plans, steps, results, verdicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Id of the mandatory terminal step every plan ends with.
pub const SYNTHESIS_STEP_ID: &str = "final_synthesis";

//
// ================= Enums =================
//

/// The two kinds of work a plan step can describe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepKind {
    /// Invokes a named data capability with parameters.
    Data,
    /// Invokes a reasoning call over the results of its dependencies.
    Analysis,
}

/// Whether a query needs the full plan/execute loop or a direct answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Financial,
    General,
}

/// The three possible outcomes of verifying a step result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    Accept,
    Retry,
    Abandon,
}

//
// ================= Step =================
//

/// One unit of planned work with declared dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Unique within a plan, stable for the plan's lifetime (e.g. "step_1").
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub kind: StepKind,
    /// DATA steps only: name of the data capability to invoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    /// Capability- or reasoning-call-specific arguments.
    #[serde(default)]
    pub parameters: Value,
    /// ANALYSIS steps only: what to calculate or interpret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_prompt: Option<String>,
    /// Ids of steps whose results must be resolved before this one runs.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl StepDescriptor {
    pub fn is_synthesis(&self) -> bool {
        self.id == SYNTHESIS_STEP_ID
    }

    /// Check that the step carries the fields its kind requires.
    /// Returns an error message when it does not.
    pub fn missing_field(&self) -> Option<String> {
        match self.kind {
            StepKind::Data if self.capability.is_none() => {
                Some(format!("DATA step '{}' is missing a capability name", self.id))
            }
            StepKind::Analysis if self.analysis_prompt.is_none() => {
                Some(format!("ANALYSIS step '{}' is missing an analysis prompt", self.id))
            }
            _ => None,
        }
    }
}

//
// ================= Step Result =================
//

/// The outcome of one execution attempt of a step.
///
/// Capability invocation never propagates a fault: a failed step is a
/// `success == false` result. A retried step produces a new result that
/// replaces the prior one under the same step id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub kind: StepKind,
    pub success: bool,
    /// DATA steps: the structured payload returned by the capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// ANALYSIS steps: the reasoning call's text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn data(step_id: impl Into<String>, payload: Value) -> Self {
        Self {
            step_id: step_id.into(),
            kind: StepKind::Data,
            success: true,
            payload: Some(payload),
            analysis: None,
            error: None,
        }
    }

    pub fn analysis(step_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            kind: StepKind::Analysis,
            success: true,
            payload: None,
            analysis: Some(text.into()),
            error: None,
        }
    }

    pub fn failed(step_id: impl Into<String>, kind: StepKind, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            kind,
            success: false,
            payload: None,
            analysis: None,
            error: Some(error.into()),
        }
    }

    /// Render this result for inclusion in a reasoning-call prompt.
    /// Failed results are flagged so downstream analysis can account for
    /// missing data.
    pub fn prompt_text(&self) -> String {
        if let Some(err) = &self.error {
            return format!("[ERROR] {}", err);
        }
        if let Some(payload) = &self.payload {
            return serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        }
        if let Some(analysis) = &self.analysis {
            return analysis.clone();
        }
        "[no result data]".to_string()
    }
}

//
// ================= Plan =================
//

/// Dependency-ordered collection of steps, terminated by the synthesis step.
///
/// Mutable only by the planner (full replacement on replan); the control
/// loop consumes steps but never edits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: Uuid,
    #[serde(default)]
    pub reasoning: String,
    pub steps: Vec<StepDescriptor>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(reasoning: impl Into<String>, steps: Vec<StepDescriptor>) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            reasoning: reasoning.into(),
            steps,
            created_at: Utc::now(),
        }
    }

    /// Build the mandatory terminal step: an ANALYSIS step that depends on
    /// every other step in the plan and produces the user-facing answer.
    pub fn synthesis_step(dependencies: Vec<String>) -> StepDescriptor {
        StepDescriptor {
            id: SYNTHESIS_STEP_ID.to_string(),
            description: "Synthesize a final answer to the user's question".to_string(),
            kind: StepKind::Analysis,
            capability: None,
            parameters: Value::Null,
            analysis_prompt: Some(
                "Synthesize all findings from the previous steps into a direct, \
                 specific answer to the user's question. Cite actual numbers where \
                 available and note any data that could not be retrieved."
                    .to_string(),
            ),
            dependencies,
        }
    }

    /// Fallback plan for queries that yield no actionable steps: the
    /// synthesis step alone, allowed to run against no prior data.
    pub fn synthesis_only(reasoning: impl Into<String>) -> Self {
        Self::new(reasoning, vec![Self::synthesis_step(Vec::new())])
    }

    pub fn synthesis(&self) -> Option<&StepDescriptor> {
        self.steps.last().filter(|s| s.is_synthesis())
    }

    /// Structural invariants:
    /// - step ids are unique
    /// - every dependency references an id earlier in the ordering
    ///   (no forward or self references)
    /// - the last step is the synthesis step and depends on every other step
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            if seen.contains(&step.id.as_str()) {
                return Err(format!("duplicate step id '{}'", step.id));
            }
            for dep in &step.dependencies {
                if !seen.contains(&dep.as_str()) {
                    return Err(format!(
                        "step '{}' depends on '{}' which does not appear earlier in the plan",
                        step.id, dep
                    ));
                }
            }
            seen.push(&step.id);
        }

        let Some(last) = self.steps.last() else {
            return Err("plan has no steps".to_string());
        };
        if !last.is_synthesis() || last.kind != StepKind::Analysis {
            return Err("plan does not end with the synthesis step".to_string());
        }
        let mut expected: Vec<&str> = seen[..seen.len() - 1].to_vec();
        expected.sort_unstable();
        let mut actual: Vec<&str> = last.dependencies.iter().map(|d| d.as_str()).collect();
        actual.sort_unstable();
        if expected != actual {
            return Err("synthesis step must depend on every other step".to_string());
        }

        Ok(())
    }
}

//
// ================= Verification =================
//

/// The verifier's judgment of one step result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub verdict: VerdictKind,
    #[serde(default)]
    pub explanation: String,
    /// RETRY only: same id as the judged step, with corrected parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_step: Option<StepDescriptor>,
    /// ABANDON only: why the plan itself is structurally wrong.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandon_reason: Option<String>,
}

impl Verification {
    pub fn accept(explanation: impl Into<String>) -> Self {
        Self {
            verdict: VerdictKind::Accept,
            explanation: explanation.into(),
            retry_step: None,
            abandon_reason: None,
        }
    }

    pub fn retry(explanation: impl Into<String>, step: StepDescriptor) -> Self {
        Self {
            verdict: VerdictKind::Retry,
            explanation: explanation.into(),
            retry_step: Some(step),
            abandon_reason: None,
        }
    }

    pub fn abandon(explanation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            verdict: VerdictKind::Abandon,
            explanation: explanation.into(),
            retry_step: None,
            abandon_reason: Some(reason.into()),
        }
    }
}

/// Context handed to the planner after an abandoned plan.
#[derive(Debug, Clone)]
pub struct PlanFailure {
    pub plan: Plan,
    pub reason: String,
}

//
// ================= Run Output =================
//

/// Everything one control-loop invocation surfaces: the best available
/// answer, the full result set, and the per-run event trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub run_id: Uuid,
    pub query: String,
    pub query_kind: QueryKind,
    /// Synthesis text (financial queries) or the direct answer (general).
    pub answer: Option<String>,
    pub results: HashMap<String, StepResult>,
    /// Append-only event log for this invocation.
    pub trace: Vec<String>,
    /// True when the iteration ceiling cut the run short.
    pub partial: bool,
    pub calls_made: u32,
    pub replans: u32,
    pub elapsed_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Data => write!(f, "DATA"),
            StepKind::Analysis => write!(f, "ANALYSIS"),
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictKind::Accept => write!(f, "accept"),
            VerdictKind::Retry => write!(f, "retry"),
            VerdictKind::Abandon => write!(f, "abandon"),
        }
    }
}
