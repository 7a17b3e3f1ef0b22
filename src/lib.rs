//! Finance Insight Agent
//!
//! A natural-language financial question-answering agent that:
//! - Classifies queries as financial or general knowledge
//! - Decomposes financial queries into DATA and ANALYSIS steps
//! - Executes steps against typed capabilities and reasoning calls
//! - Verifies every step result against the original query
//! - Retries, replans, or degrades within strict ceilings
//! - Always returns the best available answer, never an unhandled fault
//!
//! CONTROL LOOP:
//! QUERY → CLASSIFY → PLAN → EXECUTE → VERIFY → (ADVANCE | RETRY | REPLAN) → DONE

pub mod agent;
pub mod api;
pub mod capabilities;
pub mod classifier;
pub mod error;
pub mod executor;
pub mod models;
pub mod planner;
pub mod reasoning;
pub mod verifier;

pub use error::{AgentError, Result};

// Re-export common types
pub use agent::Agent;
pub use models::*;
