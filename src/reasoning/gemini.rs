//! Gemini API client implementing the reasoning-call interface
//!
//! Uses a long-lived reqwest::Client for connection pooling. Sampling
//! settings are chosen per role.

use crate::error::AgentError;
use crate::reasoning::{LanguageModel, ReasoningRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: String) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(AgentError::HttpError)?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_ENDPOINT.to_string(),
        })
    }

    /// Read `GEMINI_API_KEY` from the environment.
    pub fn from_env() -> crate::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            AgentError::ReasoningError("GEMINI_API_KEY not configured".to_string())
        })?;
        Self::new(api_key)
    }

    fn sampling(role: ReasoningRole) -> GenerationConfig {
        // Classification and verification need determinism; planning and
        // analysis a little exploration; synthesis the most freedom.
        let (temperature, max_output_tokens) = match role {
            ReasoningRole::Classification => (0.0, 16),
            ReasoningRole::Verification => (0.0, 1500),
            ReasoningRole::Planning => (0.1, 2048),
            ReasoningRole::Analysis => (0.1, 2048),
            ReasoningRole::Synthesis => (0.3, 2048),
        };
        GenerationConfig {
            temperature,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens,
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(&self, role: ReasoningRole, system: &str, prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(AgentError::ReasoningError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Self::sampling(role),
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system.to_string(),
                }],
            },
        };

        debug!(?role, "Calling Gemini API");

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!("Gemini API request failed: {}", e);
            AgentError::ReasoningError(format!("Gemini API error: {}", e))
        })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(AgentError::ReasoningError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::ReasoningError(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| {
                AgentError::ReasoningError("Empty response from Gemini".to_string())
            })?;

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
