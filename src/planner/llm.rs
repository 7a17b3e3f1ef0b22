//! Reasoning-call-backed planner
//!
//! Decomposes a financial query into DATA and ANALYSIS steps, normalizes
//! the model's output into a structurally valid plan, and appends the
//! mandatory synthesis step.

use crate::capabilities::CapabilityRegistry;
use crate::models::{Plan, PlanFailure, StepDescriptor, StepKind};
use crate::planner::Planner;
use crate::reasoning::{extract_json_object, LanguageModel, ReasoningRole};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const PLANNING_SYSTEM_PROMPT: &str = r#"You are an expert equity research analyst with access to multiple financial data sources.

Decompose the financial query into executable steps. Each step is either:
1. DATA - fetch raw data using one of the capabilities below
2. ANALYSIS - reason about data fetched by earlier steps

Available capabilities:
{capabilities}

RULES:
1. Create steps in logical order: DATA steps first, then ANALYSIS steps that depend on them
2. DATA steps MUST set "capability" (exact name from the list) and "parameters"
3. ANALYSIS steps MUST set "analysis_prompt"
4. "dependencies" lists the ids of earlier steps whose results a step needs
5. Use the simplest plan that answers the query; do not fetch data you do not need
6. When comparing companies, create a separate DATA step per company
7. Do NOT include a synthesis step; it is appended automatically
{replan_context}
Return a JSON object with this EXACT structure:
{
    "reasoning": "Brief explanation of the decomposition strategy",
    "steps": [
        {
            "id": "step_1",
            "description": "What this step does",
            "kind": "DATA",
            "capability": "get_stock_price",
            "parameters": {"ticker": "AAPL"},
            "dependencies": []
        },
        {
            "id": "step_2",
            "description": "Analyze the price data",
            "kind": "ANALYSIS",
            "analysis_prompt": "Assess whether the price trend supports...",
            "dependencies": ["step_1"]
        }
    ]
}

Return ONLY valid JSON, no additional text."#;

#[derive(Deserialize)]
struct RawDecomposition {
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    id: String,
    #[serde(default)]
    description: String,
    kind: StepKind,
    #[serde(default)]
    capability: Option<String>,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    analysis_prompt: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

pub struct LlmPlanner {
    model: Arc<dyn LanguageModel>,
    capability_descriptions: String,
}

impl LlmPlanner {
    pub fn new(model: Arc<dyn LanguageModel>, registry: &CapabilityRegistry) -> Self {
        Self {
            model,
            capability_descriptions: registry.descriptions_for_prompt(),
        }
    }

    fn build_system_prompt(&self, prior_failure: Option<&PlanFailure>) -> String {
        let replan_context = match prior_failure {
            Some(failure) => {
                let prev = serde_json::to_string_pretty(&failure.plan.steps)
                    .unwrap_or_else(|_| "<unserializable>".to_string());
                format!(
                    "\nIMPORTANT: This is a REPLAN. The previous plan was abandoned.\n\
                     Reason: {}\nPrevious plan: {}\n\
                     Create an improved plan that addresses the issue above.\n",
                    failure.reason, prev
                )
            }
            None => String::new(),
        };

        PLANNING_SYSTEM_PROMPT
            .replace("{capabilities}", &self.capability_descriptions)
            .replace("{replan_context}", &replan_context)
    }

    /// Parse and normalize the model's decomposition:
    /// - empty ids are assigned positionally, duplicates keep the first step
    /// - dependencies are filtered to ids that appear earlier (forward and
    ///   self references are dropped)
    /// - any model-supplied synthesis step is discarded; the canonical one
    ///   is appended depending on every other step
    fn parse_plan(&self, response: &str) -> Option<Plan> {
        let cleaned = extract_json_object(response);
        let raw: RawDecomposition = match serde_json::from_str(cleaned) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to parse decomposition JSON");
                return None;
            }
        };

        let mut steps: Vec<StepDescriptor> = Vec::with_capacity(raw.steps.len() + 1);
        let mut seen: Vec<String> = Vec::with_capacity(raw.steps.len());

        for (index, raw_step) in raw.steps.into_iter().enumerate() {
            let id = if raw_step.id.trim().is_empty() {
                format!("step_{}", index + 1)
            } else {
                raw_step.id.trim().to_string()
            };

            if id == crate::models::SYNTHESIS_STEP_ID {
                continue;
            }
            if seen.iter().any(|s| s == &id) {
                warn!(step_id = %id, "Dropping duplicate step id from decomposition");
                continue;
            }

            let dependencies: Vec<String> = raw_step
                .dependencies
                .into_iter()
                .filter(|dep| seen.iter().any(|s| s == dep))
                .collect();

            let step = StepDescriptor {
                id: id.clone(),
                description: raw_step.description,
                kind: raw_step.kind,
                capability: raw_step.capability,
                parameters: raw_step.parameters,
                analysis_prompt: raw_step.analysis_prompt,
                dependencies,
            };

            // Kept even when incomplete: execution surfaces the failure and
            // the verifier decides whether to retry or abandon.
            if let Some(msg) = step.missing_field() {
                warn!("Decomposition validation warning: {}", msg);
            }

            seen.push(id);
            steps.push(step);
        }

        if steps.is_empty() {
            return None;
        }

        steps.push(Plan::synthesis_step(seen));
        let plan = Plan::new(raw.reasoning, steps);

        match plan.validate() {
            Ok(()) => Some(plan),
            Err(e) => {
                warn!(error = %e, "Normalized plan failed validation");
                None
            }
        }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, query: &str, prior_failure: Option<&PlanFailure>) -> Result<Plan> {
        let system = self.build_system_prompt(prior_failure);
        let prompt = format!(
            "Decompose this financial query into executable steps:\n\n\
             Query: \"{}\"\n\n\
             Think about which data needs to be fetched, which companies are \
             involved, what time periods matter, and what calculations or \
             comparisons are needed. Provide the decomposition as JSON.",
            query
        );

        let response = self
            .model
            .generate(ReasoningRole::Planning, &system, &prompt)
            .await?;

        match self.parse_plan(&response) {
            Some(plan) => {
                debug!(
                    plan_id = %plan.plan_id,
                    step_count = plan.steps.len(),
                    replan = prior_failure.is_some(),
                    "Plan created"
                );
                Ok(plan)
            }
            None => {
                // No actionable plan: fall back to synthesis alone, allowed
                // to run against no prior data.
                warn!("No actionable decomposition; falling back to synthesis-only plan");
                Ok(Plan::synthesis_only(
                    "decomposition produced no executable steps",
                ))
            }
        }
    }
}
