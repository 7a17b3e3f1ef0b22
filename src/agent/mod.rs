//! Control loop - the orchestrating state machine
//!
//! QUERY → CLASSIFY → PLAN → EXECUTE → VERIFY → (ADVANCE | RETRY | REPLAN) → … → DONE
//!
//! One invocation owns one plan, a cursor, and the retry/replan/iteration
//! counters. Steps run strictly one at a time: later steps may depend on
//! earlier results, and retry bookkeeping assumes a single in-flight step.
//! Separate invocations share no mutable state and may run concurrently.

use crate::capabilities::CapabilityRegistry;
use crate::classifier::QueryClassifier;
use crate::executor::Executor;
use crate::models::{
    AgentOutput, Plan, PlanFailure, QueryKind, StepDescriptor, StepResult, VerdictKind,
    SYNTHESIS_STEP_ID,
};
use crate::planner::{LlmPlanner, Planner};
use crate::reasoning::{LanguageModel, ReasoningRole};
use crate::verifier::{LlmVerifier, Verifier};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Max re-executions of a single step before its latest result is accepted
/// as-is.
pub const MAX_RETRIES_PER_STEP: u32 = 2;
/// Max full replans per invocation.
pub const MAX_REPLANS: u32 = 1;
/// Hard ceiling on executor invocations per invocation. The backstop
/// against runaway plans: whatever the verdict sequence, total work is
/// bounded.
pub const MAX_EXECUTOR_CALLS: u32 = 40;

const DIRECT_SYSTEM: &str =
    "You are a financial analysis assistant. The user's question does not \
     require real-time market data or specific company financials. Provide a \
     helpful, educational response: explain concepts clearly with examples, \
     keep general advice educational rather than prescriptive, and stay \
     concise (2-4 paragraphs).";

/// The agent: classifies a query, then either answers directly or drives
/// the plan–execute–verify–replan loop to completion.
pub struct Agent {
    classifier: QueryClassifier,
    planner: Box<dyn Planner>,
    executor: Executor,
    verifier: Box<dyn Verifier>,
    direct_model: Arc<dyn LanguageModel>,
}

impl Agent {
    pub fn new(
        classifier: QueryClassifier,
        planner: Box<dyn Planner>,
        executor: Executor,
        verifier: Box<dyn Verifier>,
        direct_model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            classifier,
            planner,
            executor,
            verifier,
            direct_model,
        }
    }

    /// Wire every reasoning-backed component to one shared model.
    pub fn from_model(model: Arc<dyn LanguageModel>, registry: CapabilityRegistry) -> Self {
        let planner = LlmPlanner::new(model.clone(), &registry);
        Self::new(
            QueryClassifier::new(model.clone()),
            Box::new(planner),
            Executor::new(registry, model.clone()),
            Box::new(LlmVerifier::new(model.clone())),
            model,
        )
    }

    /// Process one query end to end. Always returns a terminal output:
    /// the best available answer, never an unhandled fault.
    pub async fn answer(&self, query: &str) -> AgentOutput {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let mut trace: Vec<String> = Vec::new();

        info!(%run_id, %query, "Agent: starting run");
        trace.push("INPUT: query received".to_string());

        let query_kind = self.classifier.classify(query).await;
        trace.push(format!("CLASSIFY: {:?}", query_kind));

        let mut output = match query_kind {
            QueryKind::General => self.direct_answer(query, &mut trace).await,
            QueryKind::Financial => self.run_loop(query, &mut trace).await,
        };

        output.run_id = run_id;
        output.query = query.to_string();
        output.query_kind = query_kind;
        output.trace = trace;
        output.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            %run_id,
            calls_made = output.calls_made,
            replans = output.replans,
            partial = output.partial,
            "Agent: run complete"
        );
        output
    }

    /// General queries skip the loop entirely: one reasoning call.
    async fn direct_answer(&self, query: &str, trace: &mut Vec<String>) -> AgentOutput {
        let answer = match self
            .direct_model
            .generate(ReasoningRole::Synthesis, DIRECT_SYSTEM, query)
            .await
        {
            Ok(text) => {
                trace.push(format!("DIRECT: answered ({} chars)", text.len()));
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, "Direct answer failed");
                trace.push(format!("DIRECT: reasoning call failed ({})", e));
                None
            }
        };

        empty_output(answer)
    }

    /// The plan–execute–verify–replan state machine.
    async fn run_loop(&self, query: &str, trace: &mut Vec<String>) -> AgentOutput {
        // === PLANNING ===
        let mut plan = match self.planner.plan(query, None).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Planning failed, using synthesis-only fallback");
                trace.push(format!("PLAN: planner failed ({}), using fallback", e));
                Plan::synthesis_only("planner unavailable")
            }
        };
        trace.push(format!("PLAN: {} steps", plan.steps.len()));

        let mut results: HashMap<String, StepResult> = HashMap::new();
        let mut cursor: usize = 0;
        let mut retry_count: u32 = 0;
        let mut replan_count: u32 = 0;
        let mut calls_made: u32 = 0;
        let mut pending_retry: Option<StepDescriptor> = None;
        let mut partial = false;

        loop {
            // === DONE: synthesis accepted ===
            if cursor >= plan.steps.len() {
                trace.push("DONE: plan complete".to_string());
                break;
            }

            // === EXECUTING ===
            let step = pending_retry
                .take()
                .unwrap_or_else(|| plan.steps[cursor].clone());
            let result = self.executor.execute(query, &step, &results).await;
            calls_made += 1;
            trace.push(format!(
                "EXECUTE: {} ({}) - {}",
                step.id,
                step.kind,
                if result.success { "ok" } else { "failed" }
            ));

            // === Hard stop: iteration ceiling ===
            // Checked before the verdict is processed: a final ABANDON must
            // not replan and wipe the accumulated results. The last call's
            // result is kept so everything gathered so far surfaces.
            if calls_made >= MAX_EXECUTOR_CALLS {
                warn!(calls_made, "Iteration ceiling reached, surfacing partial results");
                trace.push(format!(
                    "HARD STOP: {} executor calls reached, surfacing partial results",
                    calls_made
                ));
                results.insert(step.id.clone(), result);
                partial = true;
                break;
            }

            // === VERIFYING ===
            let verification = self
                .verifier
                .verify(query, &plan, &step, &result, &results, retry_count)
                .await;
            trace.push(format!("VERIFY: {} -> {}", step.id, verification.verdict));

            match verification.verdict {
                // === ADVANCING ===
                VerdictKind::Accept => {
                    results.insert(step.id.clone(), result);
                    cursor += 1;
                    retry_count = 0;
                }

                // === RETRYING ===
                VerdictKind::Retry => {
                    // The latest attempt's result replaces any prior one for
                    // this step id, whether or not it gets retried again.
                    results.insert(step.id.clone(), result);

                    let adjusted = if retry_count < MAX_RETRIES_PER_STEP {
                        verification.retry_step
                    } else {
                        None
                    };

                    match adjusted {
                        Some(adjusted_step) => {
                            retry_count += 1;
                            debug!(step_id = %step.id, retry_count, "Retrying with adjusted step");
                            trace.push(format!(
                                "RETRY: {} attempt {}",
                                step.id,
                                retry_count + 1
                            ));
                            pending_retry = Some(adjusted_step);
                        }
                        None => {
                            // Ceiling reached (or no adjusted step supplied):
                            // degrade to forced acceptance and move on.
                            trace.push(format!(
                                "RETRY: ceiling reached for {}, forcing accept",
                                step.id
                            ));
                            cursor += 1;
                            retry_count = 0;
                        }
                    }
                }

                // === REPLANNING ===
                VerdictKind::Abandon => {
                    if replan_count < MAX_REPLANS {
                        replan_count += 1;
                        let reason = verification
                            .abandon_reason
                            .unwrap_or_else(|| verification.explanation.clone());
                        warn!(%reason, "Plan abandoned, replanning");
                        trace.push(format!("REPLAN: attempt {} ({})", replan_count, reason));

                        let failure = PlanFailure { plan, reason };
                        plan = match self.planner.plan(query, Some(&failure)).await {
                            Ok(new_plan) => new_plan,
                            Err(e) => {
                                warn!(error = %e, "Replanning failed, using fallback");
                                trace.push(format!(
                                    "REPLAN: planner failed ({}), using fallback",
                                    e
                                ));
                                Plan::synthesis_only("replan unavailable")
                            }
                        };
                        trace.push(format!("PLAN: {} steps", plan.steps.len()));

                        // A replan discards everything: fresh plan, fresh
                        // results, cursor back to the start.
                        results.clear();
                        cursor = 0;
                        retry_count = 0;
                        pending_retry = None;
                    } else {
                        trace.push(format!(
                            "REPLAN: ceiling reached, forcing accept of {}",
                            step.id
                        ));
                        results.insert(step.id.clone(), result);
                        cursor += 1;
                        retry_count = 0;
                    }
                }
            }
        }

        let answer = results
            .get(SYNTHESIS_STEP_ID)
            .and_then(|r| r.analysis.clone())
            .filter(|text| !text.trim().is_empty());

        let mut output = empty_output(answer);
        output.results = results;
        output.partial = partial;
        output.calls_made = calls_made;
        output.replans = replan_count;
        output
    }
}

fn empty_output(answer: Option<String>) -> AgentOutput {
    AgentOutput {
        run_id: Uuid::nil(),
        query: String::new(),
        query_kind: QueryKind::Financial,
        answer,
        results: HashMap::new(),
        trace: Vec::new(),
        partial: false,
        calls_made: 0,
        replans: 0,
        elapsed_ms: 0,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capability;
    use crate::models::{StepKind, Verification};
    use crate::reasoning::testing::ScriptedModel;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // ---- scripted collaborators ----

    /// Planner that returns clones of preset plans, recording the failure
    /// context of each call.
    struct PresetPlanner {
        plans: Mutex<Vec<Plan>>,
        failures_seen: Mutex<Vec<Option<String>>>,
    }

    impl PresetPlanner {
        fn new(plans: Vec<Plan>) -> Self {
            Self {
                plans: Mutex::new(plans),
                failures_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Planner for PresetPlanner {
        async fn plan(
            &self,
            _query: &str,
            prior_failure: Option<&PlanFailure>,
        ) -> crate::Result<Plan> {
            self.failures_seen
                .lock()
                .unwrap()
                .push(prior_failure.map(|f| f.reason.clone()));
            let mut plans = self.plans.lock().unwrap();
            let plan = if plans.len() > 1 {
                plans.remove(0)
            } else {
                plans[0].clone()
            };
            Ok(plan)
        }
    }

    /// Verifier driven by a rule over (step, attempt-number-for-that-step).
    struct RuleVerifier<F>(F);

    #[async_trait]
    impl<F> Verifier for RuleVerifier<F>
    where
        F: Fn(&StepDescriptor, u32) -> Verification + Send + Sync,
    {
        async fn verify(
            &self,
            _query: &str,
            _plan: &Plan,
            step: &StepDescriptor,
            _result: &StepResult,
            _results: &HashMap<String, StepResult>,
            retry_count: u32,
        ) -> Verification {
            (self.0)(step, retry_count)
        }
    }

    /// Capability whose payload carries an invocation counter.
    struct CountingCapability {
        name: &'static str,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Capability for CountingCapability {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "counting test capability"
        }
        async fn invoke(&self, _parameters: &Value) -> crate::Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!({"invocation": n}))
        }
    }

    // ---- fixtures ----

    fn data_step(id: &str, capability: &'static str) -> StepDescriptor {
        StepDescriptor {
            id: id.to_string(),
            description: format!("fetch {}", id),
            kind: StepKind::Data,
            capability: Some(capability.to_string()),
            parameters: json!({"ticker": "AAPL"}),
            analysis_prompt: None,
            dependencies: vec![],
        }
    }

    fn analysis_step(id: &str, deps: &[&str]) -> StepDescriptor {
        StepDescriptor {
            id: id.to_string(),
            description: format!("analyze {}", id),
            kind: StepKind::Analysis,
            capability: None,
            parameters: Value::Null,
            analysis_prompt: Some("interpret".to_string()),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn registry_with(names: &[&'static str]) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        for name in names {
            registry.register(Arc::new(CountingCapability {
                name,
                calls: AtomicU32::new(0),
            }));
        }
        registry
    }

    fn accept_all() -> Box<dyn Verifier> {
        Box::new(RuleVerifier(|_: &StepDescriptor, _| {
            Verification::accept("ok")
        }))
    }

    fn agent_with(
        planner: Box<dyn Planner>,
        verifier: Box<dyn Verifier>,
        registry: CapabilityRegistry,
    ) -> Agent {
        // Separate scripted models per seam so the classifier script does
        // not interfere with analysis output.
        let classifier = QueryClassifier::new(Arc::new(ScriptedModel::new(["YES"])));
        let executor = Executor::new(registry, Arc::new(ScriptedModel::new(["synthesized answer"])));
        Agent::new(
            classifier,
            planner,
            executor,
            verifier,
            Arc::new(ScriptedModel::new(["direct answer"])),
        )
    }

    // ---- scenarios ----

    #[tokio::test]
    async fn general_query_takes_the_direct_path() {
        let classifier = QueryClassifier::new(Arc::new(ScriptedModel::new(["NO"])));
        let executor = Executor::new(
            CapabilityRegistry::new(),
            Arc::new(ScriptedModel::new(["unused"])),
        );
        let agent = Agent::new(
            classifier,
            Box::new(PresetPlanner::new(vec![Plan::synthesis_only("")])),
            executor,
            accept_all(),
            Arc::new(ScriptedModel::new(["a P/E ratio is..."])),
        );

        let output = agent.answer("What is a P/E ratio?").await;
        assert_eq!(output.query_kind, QueryKind::General);
        assert_eq!(output.answer.as_deref(), Some("a P/E ratio is..."));
        assert_eq!(output.calls_made, 0);
        assert!(output.results.is_empty());
    }

    #[tokio::test]
    async fn scenario_a_synthesis_only_completes_in_one_call() {
        let planner = Box::new(PresetPlanner::new(vec![Plan::synthesis_only("no subject")]));
        let agent = agent_with(planner, accept_all(), registry_with(&[]));

        let output = agent.answer("something unresolvable").await;
        assert_eq!(output.calls_made, 1);
        assert!(!output.partial);
        assert_eq!(output.answer.as_deref(), Some("synthesized answer"));
        assert_eq!(output.results.len(), 1);
    }

    #[tokio::test]
    async fn scenario_b_diamond_plan_completes_in_four_calls() {
        let plan = Plan::new(
            "",
            vec![
                data_step("data_1", "get_stock_price"),
                data_step("data_2", "get_key_metrics"),
                analysis_step("analysis_1", &["data_1", "data_2"]),
                Plan::synthesis_step(vec![
                    "data_1".to_string(),
                    "data_2".to_string(),
                    "analysis_1".to_string(),
                ]),
            ],
        );
        assert!(plan.validate().is_ok());

        let planner = Box::new(PresetPlanner::new(vec![plan]));
        let agent = agent_with(
            planner,
            accept_all(),
            registry_with(&["get_stock_price", "get_key_metrics"]),
        );

        let output = agent.answer("Compare AAPL's price to its metrics").await;
        assert_eq!(output.calls_made, 4);
        assert_eq!(output.results.len(), 4);
        assert_eq!(output.replans, 0);
        assert!(output.answer.is_some());
    }

    #[tokio::test]
    async fn scenario_c_two_retries_then_accept() {
        let plan = Plan::new(
            "",
            vec![
                data_step("step_1", "get_stock_price"),
                Plan::synthesis_step(vec!["step_1".to_string()]),
            ],
        );
        let planner = Box::new(PresetPlanner::new(vec![plan]));

        // step_1: retry on its first two attempts, accept on the third.
        let verifier = Box::new(RuleVerifier(|step: &StepDescriptor, retry_count| {
            if step.id == "step_1" && retry_count < 2 {
                Verification::retry("incomplete payload", step.clone())
            } else {
                Verification::accept("ok")
            }
        }));

        let agent = agent_with(planner, verifier, registry_with(&["get_stock_price"]));
        let output = agent.answer("q").await;

        // 3 executions of step_1 + 1 synthesis
        assert_eq!(output.calls_made, 4);
        assert!(!output.partial);
        assert!(output.answer.is_some());
    }

    #[tokio::test]
    async fn scenario_d_abandon_triggers_one_replan_with_reason() {
        let wrong = Plan::new(
            "wrong subject",
            vec![
                data_step("step_1", "get_stock_price"),
                Plan::synthesis_step(vec!["step_1".to_string()]),
            ],
        );
        let fixed = Plan::new(
            "fixed",
            vec![
                data_step("step_a", "get_stock_price"),
                Plan::synthesis_step(vec!["step_a".to_string()]),
            ],
        );
        let planner = PresetPlanner::new(vec![wrong, fixed]);
        let failures = Arc::new(planner);

        let verifier = Box::new(RuleVerifier(|step: &StepDescriptor, _| {
            if step.id == "step_1" {
                Verification::abandon("wrong company", "resolved the wrong subject")
            } else {
                Verification::accept("ok")
            }
        }));

        struct SharedPlanner(Arc<PresetPlanner>);
        #[async_trait]
        impl Planner for SharedPlanner {
            async fn plan(
                &self,
                query: &str,
                prior_failure: Option<&PlanFailure>,
            ) -> crate::Result<Plan> {
                self.0.plan(query, prior_failure).await
            }
        }

        let agent = agent_with(
            Box::new(SharedPlanner(failures.clone())),
            verifier,
            registry_with(&["get_stock_price"]),
        );
        let output = agent.answer("q").await;

        assert_eq!(output.replans, 1);
        // Old plan's results were discarded; only the fresh plan's remain.
        assert!(output.results.contains_key("step_a"));
        assert!(!output.results.contains_key("step_1"));
        assert!(output.answer.is_some());

        let seen = failures.failures_seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_none());
        assert_eq!(seen[1].as_deref(), Some("resolved the wrong subject"));
    }

    #[tokio::test]
    async fn scenario_e_endless_retry_is_force_accepted() {
        let plan = Plan::new(
            "",
            vec![
                data_step("step_1", "get_stock_price"),
                Plan::synthesis_step(vec!["step_1".to_string()]),
            ],
        );
        let planner = Box::new(PresetPlanner::new(vec![plan]));

        // step_1 is never good enough.
        let verifier = Box::new(RuleVerifier(|step: &StepDescriptor, _| {
            if step.id == "step_1" {
                Verification::retry("still not right", step.clone())
            } else {
                Verification::accept("ok")
            }
        }));

        let agent = agent_with(planner, verifier, registry_with(&["get_stock_price"]));
        let output = agent.answer("q").await;

        // 1 initial + 2 re-executions, force-accept, then synthesis.
        assert_eq!(output.calls_made, 4);
        assert!(!output.partial);
        assert!(output.answer.is_some());
    }

    #[tokio::test]
    async fn replan_ceiling_forces_acceptance_after_one_replan() {
        let plan = Plan::new(
            "",
            vec![
                data_step("step_1", "get_stock_price"),
                Plan::synthesis_step(vec!["step_1".to_string()]),
            ],
        );
        let planner = Box::new(PresetPlanner::new(vec![plan]));

        // Every data step result demands a replan, forever.
        let verifier = Box::new(RuleVerifier(|step: &StepDescriptor, _| {
            if step.is_synthesis() {
                Verification::accept("terminal")
            } else {
                Verification::abandon("wrong", "wrong approach")
            }
        }));

        let agent = agent_with(planner, verifier, registry_with(&["get_stock_price"]));
        let output = agent.answer("q").await;

        assert_eq!(output.replans, 1);
        assert!(!output.partial);
        assert!(output.answer.is_some());
    }

    #[tokio::test]
    async fn hard_stop_bounds_total_executor_calls() {
        // 20 data steps, every one of them retried forever: without the
        // ceiling this would take 60 executions.
        let mut steps: Vec<StepDescriptor> = (1..=20)
            .map(|i| data_step(&format!("step_{}", i), "get_stock_price"))
            .collect();
        let deps = steps.iter().map(|s| s.id.clone()).collect();
        steps.push(Plan::synthesis_step(deps));
        let plan = Plan::new("", steps);
        assert!(plan.validate().is_ok());

        let planner = Box::new(PresetPlanner::new(vec![plan]));
        let verifier = Box::new(RuleVerifier(|step: &StepDescriptor, _| {
            if step.is_synthesis() {
                Verification::accept("terminal")
            } else {
                Verification::retry("never good", step.clone())
            }
        }));

        let agent = agent_with(planner, verifier, registry_with(&["get_stock_price"]));
        let output = agent.answer("q").await;

        assert!(output.partial);
        assert_eq!(output.calls_made, MAX_EXECUTOR_CALLS);
        // Partial results still surface.
        assert!(!output.results.is_empty());
        assert!(output.answer.is_none());
    }

    #[tokio::test]
    async fn hard_stop_keeps_gathered_results_when_final_verdict_abandons() {
        // Steps 1..=13 burn 3 calls each (39 total); the 40th call executes
        // step_14, which demands a replan with the replan budget unspent.
        // The ceiling must win: no replan, and the accumulated results
        // survive.
        let mut steps: Vec<StepDescriptor> = (1..=20)
            .map(|i| data_step(&format!("step_{}", i), "get_stock_price"))
            .collect();
        let deps = steps.iter().map(|s| s.id.clone()).collect();
        steps.push(Plan::synthesis_step(deps));
        let plan = Plan::new("", steps);
        assert!(plan.validate().is_ok());

        let planner = Box::new(PresetPlanner::new(vec![plan]));
        let verifier = Box::new(RuleVerifier(|step: &StepDescriptor, _| {
            if step.id == "step_14" {
                Verification::abandon("wrong", "wrong approach")
            } else if step.is_synthesis() {
                Verification::accept("terminal")
            } else {
                Verification::retry("never good", step.clone())
            }
        }));

        let agent = agent_with(planner, verifier, registry_with(&["get_stock_price"]));
        let output = agent.answer("q").await;

        assert!(output.partial);
        assert_eq!(output.calls_made, MAX_EXECUTOR_CALLS);
        assert_eq!(output.replans, 0);
        // 13 force-accepted steps plus the final call's own result.
        assert_eq!(output.results.len(), 14);
        assert!(output.results.contains_key("step_1"));
        assert!(output.results.contains_key("step_14"));
    }

    #[tokio::test]
    async fn retrying_one_step_never_touches_unrelated_results() {
        let plan = Plan::new(
            "",
            vec![
                data_step("step_1", "get_stock_price"),
                data_step("step_2", "get_key_metrics"),
                Plan::synthesis_step(vec!["step_1".to_string(), "step_2".to_string()]),
            ],
        );
        let planner = Box::new(PresetPlanner::new(vec![plan]));

        // Only step_2 gets retried (twice, then accepted).
        let verifier = Box::new(RuleVerifier(|step: &StepDescriptor, retry_count| {
            if step.id == "step_2" && retry_count < 2 {
                Verification::retry("retry step_2", step.clone())
            } else {
                Verification::accept("ok")
            }
        }));

        let agent = agent_with(
            planner,
            verifier,
            registry_with(&["get_stock_price", "get_key_metrics"]),
        );
        let output = agent.answer("q").await;

        // step_1 ran exactly once; step_2 three times; its latest result won.
        assert_eq!(output.results["step_1"].payload.as_ref().unwrap()["invocation"], json!(1));
        assert_eq!(output.results["step_2"].payload.as_ref().unwrap()["invocation"], json!(3));
        assert_eq!(output.calls_made, 5);
    }

    #[tokio::test]
    async fn trace_records_the_loop_transitions() {
        let planner = Box::new(PresetPlanner::new(vec![Plan::synthesis_only("")]));
        let agent = agent_with(planner, accept_all(), registry_with(&[]));

        let output = agent.answer("q").await;
        assert!(output.trace.iter().any(|e| e.starts_with("PLAN:")));
        assert!(output.trace.iter().any(|e| e.starts_with("EXECUTE:")));
        assert!(output.trace.iter().any(|e| e.starts_with("VERIFY:")));
        assert!(output.trace.iter().any(|e| e.starts_with("DONE:")));
    }
}
