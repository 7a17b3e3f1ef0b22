//! Planner trait and implementations
//!
//! The planner turns a query (plus any prior failed-plan context) into a
//! dependency-ordered plan terminated by the mandatory synthesis step.

use crate::models::{Plan, PlanFailure, StepDescriptor, StepKind};
use crate::Result;
use async_trait::async_trait;
use serde_json::json;

pub mod llm;
pub use llm::LlmPlanner;

/// Trait for plan generation (reasoning-call controlled)
#[async_trait]
pub trait Planner: Send + Sync {
    /// Create a plan for a query. `prior_failure` carries the abandoned plan
    /// and reason when this is a replan.
    async fn plan(&self, query: &str, prior_failure: Option<&PlanFailure>) -> Result<Plan>;
}

/// Fixed-shape planner for development & testing.
/// Keeps the loop functional without a reasoning-call dependency.
pub struct MockPlanner;

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(&self, query: &str, _prior_failure: Option<&PlanFailure>) -> Result<Plan> {
        let steps = vec![
            StepDescriptor {
                id: "step_1".to_string(),
                description: "Fetch the current quote".to_string(),
                kind: StepKind::Data,
                capability: Some("get_stock_price".to_string()),
                parameters: json!({"ticker": "AAPL"}),
                analysis_prompt: None,
                dependencies: vec![],
            },
            StepDescriptor {
                id: "step_2".to_string(),
                description: "Interpret the quote data".to_string(),
                kind: StepKind::Analysis,
                capability: None,
                parameters: serde_json::Value::Null,
                analysis_prompt: Some(format!("Interpret the fetched data for: {}", query)),
                dependencies: vec!["step_1".to_string()],
            },
            Plan::synthesis_step(vec!["step_1".to_string(), "step_2".to_string()]),
        ];

        Ok(Plan::new("mock decomposition", steps))
    }
}
