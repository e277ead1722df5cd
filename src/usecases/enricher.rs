//! LLM enrichment. Sends a single post's text through a JSON-mode chat
//! completion and stores the resulting keywords, category, sentiment, and
//! named entities.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    BatchReport, Category, Entities, EnrichmentOutcome, LlmUsageEntry, MicroUsd, PostEnrichment,
    Sentiment, SkipReason,
};
use crate::ports::outbound::{EnrichmentPrompt, LlmPort, Store};

const MAX_TEXT_CHARS: usize = 6_000;
const TEMPERATURE: f32 = 0.1;

/// Rough completion-size budget used only to project whether *this* call
/// would push the day's spend over the cap before it is issued; the real
/// cost is recorded from actual token counts once the call returns.
const ESTIMATED_COMPLETION_TOKENS: i32 = 400;

const SYSTEM_PROMPT: &str = r#"You analyze a single social-media post and extract structured metadata.

Respond with a JSON object containing exactly these keys:
{
  "explicit_keywords": ["..."],
  "implicit_keywords": ["..."],
  "category": "politics|economics|technology|sports|entertainment|health|military|crime|society|other",
  "sentiment": "positive|negative|neutral",
  "entities": {"persons": ["..."], "organizations": ["..."], "locations": ["..."]}
}

explicit_keywords are terms that appear verbatim in the text. implicit_keywords are
related concepts the text is *about* even if the word itself never appears (e.g. a
post describing a minister accepting cash implies "corruption"). Respond with JSON only."#;

pub struct Enricher<L: LlmPort, S: Store> {
    llm: std::sync::Arc<L>,
    store: std::sync::Arc<S>,
    model: String,
    daily_cost_cap: MicroUsd,
}

impl<L: LlmPort, S: Store> Enricher<L, S> {
    pub fn new(llm: std::sync::Arc<L>, store: std::sync::Arc<S>, model: String, daily_cost_cap: MicroUsd) -> Self {
        Self {
            llm,
            store,
            model,
            daily_cost_cap,
        }
    }

    fn truncate(text: &str) -> &str {
        if text.len() <= MAX_TEXT_CHARS {
            return text;
        }
        match text[..MAX_TEXT_CHARS].rsplit_once(' ') {
            Some((head, _)) => head,
            None => &text[..MAX_TEXT_CHARS],
        }
    }

    fn today_start_utc() -> DateTime<Utc> {
        let now = Utc::now();
        now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
    }

    /// ~4 characters per token is the standard rough estimate for English
    /// prose; good enough for a pre-flight budget check, not for billing.
    fn estimate_prompt_tokens(system_prompt: &str, user_prompt: &str) -> i32 {
        ((system_prompt.len() + user_prompt.len()) / 4) as i32
    }

    fn parse_enrichment(post_id: Uuid, json: &serde_json::Value, model: &str, token_count: i32, processing_time_ms: i64) -> PostEnrichment {
        let explicit = json
            .get("explicit_keywords")
            .and_then(|v| v.as_array())
            .map(|a| normalize_keywords(a))
            .unwrap_or_default();
        let implicit = json
            .get("implicit_keywords")
            .and_then(|v| v.as_array())
            .map(|a| normalize_keywords(a))
            .unwrap_or_default();
        let category = json
            .get("category")
            .and_then(|v| v.as_str())
            .map(Category::parse_or_default)
            .unwrap_or_default();
        let sentiment = json
            .get("sentiment")
            .and_then(|v| v.as_str())
            .map(Sentiment::parse_or_default)
            .unwrap_or_default();
        let entities = json
            .get("entities")
            .map(|e| Entities {
                persons: string_set(e, "persons"),
                organizations: string_set(e, "organizations"),
                locations: string_set(e, "locations"),
            })
            .unwrap_or_default();

        PostEnrichment {
            post_id,
            explicit_keywords: explicit,
            implicit_keywords: implicit,
            category,
            sentiment,
            entities,
            model_used: model.to_string(),
            token_count,
            processing_time_ms,
            enriched_at: Utc::now(),
        }
    }

    pub async fn enrich_post(&self, post_id: Uuid) -> Result<EnrichmentOutcome, crate::domain::DomainError> {
        if self.store.get_enrichment(post_id).await?.is_some() {
            return Ok(EnrichmentOutcome::Skipped(SkipReason::AlreadyEnriched));
        }
        let Some(content) = self.store.get_post_content(post_id).await? else {
            return Ok(EnrichmentOutcome::Skipped(SkipReason::NoText));
        };
        if content.text_content.trim().is_empty() {
            return Ok(EnrichmentOutcome::Skipped(SkipReason::NoText));
        }

        let text = Self::truncate(&content.text_content);

        let spent_today = self.store.cost_since(Self::today_start_utc()).await?;
        let cap_dollars = self.daily_cost_cap.as_dollars();
        let spent_dollars = spent_today.as_dollars();
        if cap_dollars > 0.0 {
            let projected_tokens = Self::estimate_prompt_tokens(SYSTEM_PROMPT, text);
            let projected_call_cost = self
                .llm
                .estimate_cost(projected_tokens, ESTIMATED_COMPLETION_TOKENS)
                .as_dollars();
            let projected_total = spent_dollars + projected_call_cost;
            if projected_total >= cap_dollars {
                return Ok(EnrichmentOutcome::Error(
                    "daily LLM cost cap exceeded, refusing further enrichment".to_string(),
                ));
            }
            if spent_dollars / cap_dollars >= 0.8 {
                tracing::warn!(spent_dollars, cap_dollars, "approaching daily LLM cost cap");
            }
        }

        let prompt = EnrichmentPrompt {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: text.to_string(),
            model: self.model.clone(),
            temperature: TEMPERATURE,
        };

        let result = match self.llm.complete_json(prompt).await {
            Ok(r) => r,
            Err(e) => return Ok(EnrichmentOutcome::Error(e.to_string())),
        };

        if result.total_tokens > 0 {
            let cost = self.llm.estimate_cost(result.prompt_tokens, result.completion_tokens);
            self.store
                .append_usage_entry(&LlmUsageEntry {
                    id: Uuid::new_v4(),
                    model: result.model.clone(),
                    prompt_tokens: result.prompt_tokens,
                    completion_tokens: result.completion_tokens,
                    total_tokens: result.total_tokens,
                    estimated_cost_usd: cost,
                    task_name: "enrich_post".to_string(),
                    posts_processed: 1,
                    created_at: Utc::now(),
                })
                .await?;
        }

        let Some(json) = result.parsed_json else {
            return Ok(EnrichmentOutcome::Error("LLM response missing parsed JSON".to_string()));
        };

        let enrichment = Self::parse_enrichment(
            post_id,
            &json,
            &result.model,
            result.total_tokens,
            result.duration_ms,
        );
        self.store.save_enrichment(&enrichment).await?;
        Ok(EnrichmentOutcome::Completed(enrichment))
    }

    pub async fn enrich_pending(&self, limit: u32) -> Result<BatchReport, crate::domain::DomainError> {
        let posts = self.store.posts_pending_enrichment(limit).await?;
        let mut report = BatchReport::default();
        for post in posts {
            match self.enrich_post(post.id).await {
                Ok(EnrichmentOutcome::Completed(_)) => report.completed += 1,
                Ok(EnrichmentOutcome::Skipped(_)) => report.skipped += 1,
                Ok(EnrichmentOutcome::Error(msg)) => report.errors.push(msg),
                Err(e) => report.errors.push(e.to_string()),
            }
        }
        Ok(report)
    }
}

fn normalize_keywords(values: &[serde_json::Value]) -> BTreeSet<String> {
    values
        .iter()
        .filter_map(|v| v.as_str())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn string_set(entities: &serde_json::Value, key: &str) -> BTreeSet<String> {
    entities
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| normalize_keywords(a))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_stops_at_word_boundary() {
        let text = "a".repeat(MAX_TEXT_CHARS - 2) + " overflow words here";
        let truncated = Enricher::<crate::adapters::llm::OpenAiAdapter, crate::adapters::store::PostgresStore>::truncate(&text);
        assert!(truncated.len() <= MAX_TEXT_CHARS);
        assert!(!truncated.ends_with(' '));
    }

    #[test]
    fn normalize_keywords_lowercases_and_dedupes() {
        let values = vec![
            serde_json::json!("Corruption"),
            serde_json::json!("corruption"),
            serde_json::json!(" Bribery "),
        ];
        let set = normalize_keywords(&values);
        assert_eq!(set.len(), 2);
        assert!(set.contains("corruption"));
        assert!(set.contains("bribery"));
    }
}
