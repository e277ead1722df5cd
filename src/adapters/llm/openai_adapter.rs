//! OpenAI-compatible adapter for enrichment. Issues a single JSON-mode chat
//! completion producing the enrichment schema: explicit/implicit keywords,
//! category, sentiment, entities.
//!
//! Works against OpenAI, Azure OpenAI, or a local Ollama — any endpoint
//! speaking the `/chat/completions` shape.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{DomainError, MicroUsd};
use crate::ports::outbound::{CompletionResult, EnrichmentPrompt, LlmPort};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type MinuteLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    rpm_limiter: Arc<MinuteLimiter>,
}

impl OpenAiAdapter {
    pub fn new(api_url: String, api_key: String, rpm: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rpm.max(1)).unwrap());
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            rpm_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// LLMs sometimes wrap JSON in a markdown code fence or prose; strip that
    /// before handing the body to `serde_json`.
    fn sanitize_json(raw_text: &str) -> String {
        let trimmed = raw_text.trim();

        if let Some(without_prefix) = trimmed.strip_prefix("```json") {
            if let Some(end_idx) = without_prefix.rfind("```") {
                return without_prefix[..end_idx].trim().to_string();
            }
            return without_prefix.trim().to_string();
        }
        if let Some(without_prefix) = trimmed.strip_prefix("```") {
            if let Some(end_idx) = without_prefix.rfind("```") {
                return without_prefix[..end_idx].trim().to_string();
            }
            return without_prefix.trim().to_string();
        }

        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                return trimmed[start..=end].to_string();
            }
        }

        trimmed.to_string()
    }

    fn classify(err: &reqwest::Error, status: Option<reqwest::StatusCode>) -> bool {
        if err.is_timeout() {
            return true;
        }
        matches!(status, Some(s) if s.as_u16() == 429 || s.is_server_error())
    }

    async fn backoff_sleep(attempt: u32) {
        let exp = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt.min(5));
        let jitter = rand::random::<u64>() % (exp / 2 + 1);
        tokio::time::sleep(Duration::from_millis(exp + jitter)).await;
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    prompt_tokens: i32,
    completion_tokens: i32,
    total_tokens: i32,
}

#[async_trait::async_trait]
impl LlmPort for OpenAiAdapter {
    async fn complete_json(
        &self,
        prompt: EnrichmentPrompt,
    ) -> Result<CompletionResult, DomainError> {
        let request = ChatRequest {
            model: prompt.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user_prompt.clone(),
                },
            ],
            temperature: prompt.temperature,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let mut attempt = 0;
        loop {
            self.rpm_limiter.until_ready().await;
            let started = Instant::now();

            let send = self
                .client
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .timeout(REQUEST_TIMEOUT)
                .send();

            let response = match send.await {
                Ok(r) => r,
                Err(e) => {
                    if Self::classify(&e, None) && attempt < MAX_RETRIES {
                        attempt += 1;
                        warn!(attempt, error = %e, "LLM request failed, retrying");
                        Self::backoff_sleep(attempt).await;
                        continue;
                    }
                    return Err(DomainError::Ai(format!("request failed: {e}")));
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let transient = status.as_u16() == 429 || status.is_server_error();
                if transient && attempt < MAX_RETRIES {
                    attempt += 1;
                    warn!(attempt, %status, "LLM API returned transient error, retrying");
                    Self::backoff_sleep(attempt).await;
                    continue;
                }
                return Err(DomainError::Ai(format!(
                    "API error {status}: {}",
                    body.chars().take(200).collect::<String>()
                )));
            }

            let duration_ms = started.elapsed().as_millis() as i64;
            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| DomainError::Ai(format!("failed to parse API response: {e}")))?;

            let raw_content = parsed
                .choices
                .first()
                .map(|c| c.message.content.clone())
                .ok_or_else(|| DomainError::Ai("no response choices returned".to_string()))?;

            let clean_json = Self::sanitize_json(&raw_content);
            let parsed_json = serde_json::from_str::<serde_json::Value>(&clean_json)
                .map_err(|e| {
                    warn!(error = %e, "enrichment JSON parse failed, not retrying");
                    DomainError::Ai(format!("malformed enrichment JSON: {e}"))
                })?;

            let usage = parsed.usage.unwrap_or_default();
            debug!(tokens = usage.total_tokens, duration_ms, "enrichment completion received");

            return Ok(CompletionResult {
                content: clean_json,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                model: prompt.model.clone(),
                duration_ms,
                parsed_json: Some(parsed_json),
            });
        }
    }

    fn estimate_cost(&self, prompt_tokens: i32, completion_tokens: i32) -> MicroUsd {
        // Flat per-million-token rate; good enough for a cost *ledger*, not
        // a billing reconciliation. Adjust per model if pricing diverges.
        const MICRO_USD_PER_PROMPT_TOKEN: i64 = 150; // $0.15 / 1M tokens
        const MICRO_USD_PER_COMPLETION_TOKEN: i64 = 600; // $0.60 / 1M tokens
        let cost = (prompt_tokens as i64 * MICRO_USD_PER_PROMPT_TOKEN
            + completion_tokens as i64 * MICRO_USD_PER_COMPLETION_TOKEN)
            / 1_000;
        MicroUsd(cost)
    }
}
