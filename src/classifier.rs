//! Query classification
//!
//! Decides whether a query needs the plan/execute loop (it mentions a
//! specific company, ticker, or market data need) or can be answered
//! directly (definitions, general advice, greetings).

use crate::models::QueryKind;
use crate::reasoning::{LanguageModel, ReasoningRole};
use std::sync::Arc;
use tracing::{debug, warn};

const CLASSIFICATION_SYSTEM: &str =
    "You classify financial queries. Respond with YES or NO only.";

const CLASSIFICATION_PROMPT: &str = r#"Does this query mention or ask about a SPECIFIC company, stock, or ticker?

Query: "{query}"

STEP 1: Does the query mention a specific company name (like Apple, Tesla, Microsoft) or a stock ticker (like AAPL, TSLA, MSFT)?
- If YES -> respond "YES" (we need to fetch real data for that company)
- If NO -> go to Step 2

STEP 2: Does the query ask about general financial concepts, definitions, or generic advice with no specific company?
- If YES -> respond "NO"

YES examples:
  "What is Apple's stock price?" -> YES
  "Compare MSFT and GOOGL revenue growth" -> YES
  "Is Tesla overvalued?" -> YES

NO examples:
  "What is a P/E ratio?" -> NO
  "How should I invest?" -> NO
  "Hello!" -> NO

Response (YES or NO only):"#;

pub struct QueryClassifier {
    model: Arc<dyn LanguageModel>,
}

impl QueryClassifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Classify a query. Defaults to Financial on an unexpected answer or a
    /// failed reasoning call: better to attempt a data fetch than to miss a
    /// valid query.
    pub async fn classify(&self, query: &str) -> QueryKind {
        let prompt = CLASSIFICATION_PROMPT.replace("{query}", query);

        match self
            .model
            .generate(ReasoningRole::Classification, CLASSIFICATION_SYSTEM, &prompt)
            .await
        {
            Ok(response) => {
                let answer = response.trim().to_uppercase();
                debug!(%answer, "Query classified");
                // Only a clean negative bypasses the loop; "NOT SURE" or
                // "NONE" would otherwise match a bare prefix check.
                if answer == "NO" || answer.starts_with("NO ") || answer.starts_with("NO.") {
                    QueryKind::General
                } else {
                    QueryKind::Financial
                }
            }
            Err(e) => {
                warn!(error = %e, "Classification call failed, assuming financial");
                QueryKind::Financial
            }
        }
    }
}
