//! HTTP-backed financial data capabilities
//!
//! Each capability posts to the finance data service configured via
//! `FINANCE_API_BASE_URL`. The service aggregates market data, filings,
//! macro indicators, analyst estimates, and web search behind one JSON API.

use crate::capabilities::{require_str_param, Capability, CapabilityRegistry};
use crate::error::AgentError;
use crate::Result;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Connection-pooled client for the finance data service.
#[derive(Clone)]
pub struct FinanceApiClient {
    client: Client,
    base_url: String,
}

impl FinanceApiClient {
    pub fn new(base_url: String) -> Option<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> Option<Self> {
        let base_url = env::var("FINANCE_API_BASE_URL").ok()?;
        Self::new(base_url)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AgentError::CapabilityError(format!(
                    "Finance API request failed for {}: {}",
                    path, e
                ))
            })?;

        let status = response.status();
        let body = response.json::<Value>().await.map_err(|e| {
            AgentError::CapabilityError(format!("Invalid JSON response from {}: {}", path, e))
        })?;

        if !status.is_success() {
            return Err(AgentError::CapabilityError(format!(
                "Finance API returned {} for {}: {}",
                status, path, body
            )));
        }

        // The service reports its own failures inside a 200 envelope too.
        if let Some(err) = body.get("error").and_then(Value::as_str) {
            return Err(AgentError::CapabilityError(err.to_string()));
        }

        Ok(body)
    }
}

/// One HTTP-backed capability: a named endpoint plus its required
/// parameters and defaults.
pub struct HttpCapability {
    name: &'static str,
    description: &'static str,
    path: &'static str,
    required: &'static [&'static str],
    defaults: Vec<(&'static str, Value)>,
    api: Option<FinanceApiClient>,
}

impl HttpCapability {
    fn new(
        name: &'static str,
        description: &'static str,
        path: &'static str,
        required: &'static [&'static str],
        defaults: Vec<(&'static str, Value)>,
        api: Option<FinanceApiClient>,
    ) -> Self {
        Self {
            name,
            description,
            path,
            required,
            defaults,
            api,
        }
    }
}

#[async_trait::async_trait]
impl Capability for HttpCapability {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn invoke(&self, parameters: &Value) -> Result<Value> {
        let api = self.api.as_ref().ok_or_else(|| {
            AgentError::CapabilityError("FINANCE_API_BASE_URL is not configured".to_string())
        })?;

        if !parameters.is_object() && !parameters.is_null() {
            return Err(AgentError::InvalidCapabilityInput(
                "parameters must be a JSON object".to_string(),
            ));
        }

        for key in self.required {
            require_str_param(parameters, key)?;
        }

        let mut body = match parameters {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        for (key, value) in &self.defaults {
            body.entry(key.to_string()).or_insert_with(|| value.clone());
        }

        api.post_json(self.path, &Value::Object(body)).await
    }
}

/// Build the default registry of finance capabilities. Endpoints stay
/// registered even when the API is unconfigured so the planner can see
/// them; invocation then reports a configuration error result.
pub fn create_default_registry() -> CapabilityRegistry {
    let api = FinanceApiClient::from_env();
    let mut registry = CapabilityRegistry::new();

    registry.register(Arc::new(HttpCapability::new(
        "get_stock_price",
        "Latest price, market cap, and 52-week range for a ticker",
        "/api/v1/market/quote",
        &["ticker"],
        vec![],
        api.clone(),
    )));
    registry.register(Arc::new(HttpCapability::new(
        "get_key_metrics",
        "Valuation and profitability snapshot (P/E, margins, growth, ROE) for a ticker",
        "/api/v1/market/key-metrics",
        &["ticker"],
        vec![],
        api.clone(),
    )));
    registry.register(Arc::new(HttpCapability::new(
        "get_financial_statements",
        "Historical income, balance-sheet, or cash-flow statements; \
         parameters: ticker, statement (income|balance|cashflow)",
        "/api/v1/market/statements",
        &["ticker", "statement"],
        vec![("period", json!("annual")), ("limit", json!(4))],
        api.clone(),
    )));
    registry.register(Arc::new(HttpCapability::new(
        "get_company_news",
        "Recent company-specific news headlines for a ticker",
        "/api/v1/market/news",
        &["ticker"],
        vec![("limit", json!(10))],
        api.clone(),
    )));
    registry.register(Arc::new(HttpCapability::new(
        "get_sec_filings",
        "Recent SEC filings (10-K, 10-Q, 8-K) with dates and URLs for a ticker",
        "/api/v1/filings/list",
        &["ticker"],
        vec![("limit", json!(10))],
        api.clone(),
    )));
    registry.register(Arc::new(HttpCapability::new(
        "get_economic_indicator",
        "Macro indicator series (GDP, CPI, unemployment, fed funds rate); \
         parameters: series",
        "/api/v1/macro/indicator",
        &["series"],
        vec![],
        api.clone(),
    )));
    registry.register(Arc::new(HttpCapability::new(
        "get_treasury_yields",
        "Current treasury yield curve with inversion detection",
        "/api/v1/macro/treasury-yields",
        &[],
        vec![],
        api.clone(),
    )));
    registry.register(Arc::new(HttpCapability::new(
        "get_analyst_estimates",
        "Consensus EPS, revenue, and EBITDA forecasts for a ticker",
        "/api/v1/estimates/consensus",
        &["ticker"],
        vec![],
        api.clone(),
    )));
    registry.register(Arc::new(HttpCapability::new(
        "web_search",
        "Broader web and news search for context not covered by the data endpoints",
        "/api/v1/search",
        &["query"],
        vec![("max_results", json!(5))],
        api,
    )));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_capability_reports_error() {
        let capability = HttpCapability::new(
            "get_stock_price",
            "quote",
            "/api/v1/market/quote",
            &["ticker"],
            vec![],
            None,
        );

        let err = capability
            .invoke(&json!({"ticker": "AAPL"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("FINANCE_API_BASE_URL"));
    }

    #[test]
    fn default_registry_exposes_all_sources() {
        let registry = create_default_registry();
        for name in [
            "get_stock_price",
            "get_key_metrics",
            "get_financial_statements",
            "get_company_news",
            "get_sec_filings",
            "get_economic_indicator",
            "get_treasury_yields",
            "get_analyst_estimates",
            "web_search",
        ] {
            assert!(registry.get(name).is_some(), "missing {}", name);
        }
    }
}
