//! Step executor
//!
//! Runs one step at a time against its collaborator: DATA steps invoke the
//! named capability, ANALYSIS steps invoke a reasoning call over the
//! resolved results of their dependencies. Execution never propagates a
//! fault; every outcome is a StepResult and routing is left to the verifier
//! and the control loop.

use crate::capabilities::CapabilityRegistry;
use crate::models::{StepDescriptor, StepKind, StepResult};
use crate::reasoning::{LanguageModel, ReasoningRole};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const ANALYSIS_SYSTEM: &str =
    "You are a financial analyst. Provide detailed, specific analysis with \
     actual numbers, percentages, and calculations where relevant. Be concise \
     but thorough.";

pub struct Executor {
    registry: CapabilityRegistry,
    model: Arc<dyn LanguageModel>,
}

impl Executor {
    pub fn new(registry: CapabilityRegistry, model: Arc<dyn LanguageModel>) -> Self {
        Self { registry, model }
    }

    /// Execute one step. Every dependency of `step` is expected to have an
    /// entry in `results`; failed dependency results are passed through to
    /// analysis flagged as failed so the reasoning call can account for
    /// missing data.
    pub async fn execute(
        &self,
        query: &str,
        step: &StepDescriptor,
        results: &HashMap<String, StepResult>,
    ) -> StepResult {
        debug!(step_id = %step.id, kind = %step.kind, "Executing step");

        let result = match step.kind {
            StepKind::Data => self.execute_data(step).await,
            StepKind::Analysis => self.execute_analysis(query, step, results).await,
        };

        if let Some(err) = &result.error {
            warn!(step_id = %step.id, error = %err, "Step execution failed");
        }
        result
    }

    async fn execute_data(&self, step: &StepDescriptor) -> StepResult {
        let Some(name) = step.capability.as_deref() else {
            return StepResult::failed(
                &step.id,
                StepKind::Data,
                format!("DATA step '{}' is missing a capability name", step.id),
            );
        };

        let Some(capability) = self.registry.get(name) else {
            return StepResult::failed(
                &step.id,
                StepKind::Data,
                format!(
                    "Unknown capability '{}'. Available: {:?}",
                    name,
                    self.registry.names()
                ),
            );
        };

        match capability.invoke(&step.parameters).await {
            Ok(payload) => StepResult::data(&step.id, payload),
            Err(e) => StepResult::failed(&step.id, StepKind::Data, e.to_string()),
        }
    }

    async fn execute_analysis(
        &self,
        query: &str,
        step: &StepDescriptor,
        results: &HashMap<String, StepResult>,
    ) -> StepResult {
        let analysis_prompt = step
            .analysis_prompt
            .as_deref()
            .unwrap_or("Analyze the available data.");

        let mut dependency_context = String::new();
        for dep_id in &step.dependencies {
            let rendered = match results.get(dep_id) {
                Some(dep_result) => dep_result.prompt_text(),
                None => format!("<data not available for {}>", dep_id),
            };
            dependency_context.push_str(&format!("--- {} ---\n{}\n\n", dep_id, rendered));
        }
        if dependency_context.is_empty() {
            dependency_context.push_str("(no prior step data)\n");
        }

        let prompt = format!(
            "Original user question: \"{}\"\n\n\
             Task: {}\n{}\n\
             Available data from previous steps:\n{}",
            query, analysis_prompt, step.description, dependency_context
        );

        let role = if step.is_synthesis() {
            ReasoningRole::Synthesis
        } else {
            ReasoningRole::Analysis
        };

        match self.model.generate(role, ANALYSIS_SYSTEM, &prompt).await {
            Ok(text) => StepResult::analysis(&step.id, text),
            Err(e) => StepResult::failed(&step.id, StepKind::Analysis, e.to_string()),
        }
    }
}
