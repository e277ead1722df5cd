//! Outbound ports. Use cases call into infrastructure through these traits.
//!
//! Implemented by adapters under `crate::adapters`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Channel, ChannelHealth, ChannelHealthStatus, DomainError, EngagementSnapshot, FetchBatch,
    LlmUsageEntry, MicroUsd, Post, PostContent, PostEnrichment, PostMedia, RankedPost,
    ReactionCount, ResolveOutcome, SavedTopic, SearchQuery, SortMode,
};

/// Telegram API gateway. Resolves channel handles and fetches messages with
/// their engagement counters.
#[async_trait::async_trait]
pub trait TelegramAdapter: Send + Sync {
    /// Resolve a channel identifier (`@name`, `name`, `t.me/name`,
    /// `https://t.me/name`) to its Telegram id and metadata.
    async fn resolve(&self, identifier: &str) -> Result<ResolveOutcome, DomainError>;

    /// Fetch messages newer than `min_id` and within `max_age`, newest-first
    /// capped at `limit`. Returns the batch plus the maximum message id seen.
    async fn fetch_messages(
        &self,
        telegram_channel_id: i64,
        min_id: i64,
        max_age: Duration,
        limit: i32,
    ) -> Result<FetchBatch, DomainError>;
}

/// A single row in a collection batch, ready to be written atomically.
pub struct CollectedPost {
    pub telegram_message_id: i64,
    pub published_at: DateTime<Utc>,
    pub is_forwarded: bool,
    pub forward_from_channel_id: Option<i64>,
    pub forward_from_message_id: Option<i64>,
    pub text_content: Option<String>,
    pub language: Option<String>,
    pub media: Vec<PostMedia>,
    pub view_count: i64,
    pub forward_count: i64,
    pub reply_count: i64,
    pub reaction_score: f64,
    pub relative_engagement: f64,
    pub reactions: Vec<(String, i64)>,
}

/// Outcome of writing one post within a collection batch.
pub enum WriteOutcome {
    Inserted,
    Duplicate,
}

/// Persistence port for every entity in the data model, plus the composite
/// queries the search engine needs. Implemented against Postgres.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // --- channels ---
    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>, DomainError>;
    async fn get_channel_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Channel>, DomainError>;
    async fn list_active_channels(&self) -> Result<Vec<Channel>, DomainError>;
    async fn upsert_channel(&self, channel: &Channel) -> Result<Channel, DomainError>;
    async fn deactivate_channel(&self, channel_id: Uuid) -> Result<(), DomainError>;
    async fn record_channel_health(
        &self,
        channel_id: Uuid,
        status: ChannelHealthStatus,
        error_message: Option<&str>,
    ) -> Result<(), DomainError>;
    async fn channel_health(&self, channel_id: Uuid) -> Result<Option<ChannelHealth>, DomainError>;

    /// Writes one collection batch for a channel in a single transaction.
    /// A per-message failure is isolated (savepoint semantics) and recorded
    /// in the returned per-message outcomes rather than aborting the batch.
    /// On success, advances `last_collected_message_id`/`last_collected_at`
    /// in the same transaction when `new_cursor` is `Some`.
    async fn write_collection_batch(
        &self,
        channel_id: Uuid,
        posts: Vec<CollectedPost>,
        new_cursor: Option<i64>,
    ) -> Result<Vec<Result<WriteOutcome, DomainError>>, DomainError>;

    // --- posts / engagement ---
    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>, DomainError>;
    async fn get_post_content(&self, post_id: Uuid) -> Result<Option<PostContent>, DomainError>;
    async fn latest_snapshot(
        &self,
        post_id: Uuid,
    ) -> Result<Option<EngagementSnapshot>, DomainError>;
    async fn reaction_counts(&self, snapshot_id: Uuid) -> Result<Vec<ReactionCount>, DomainError>;

    // --- enrichment ---
    async fn posts_pending_enrichment(&self, limit: u32) -> Result<Vec<Post>, DomainError>;
    async fn get_enrichment(&self, post_id: Uuid) -> Result<Option<PostEnrichment>, DomainError>;
    async fn save_enrichment(&self, enrichment: &PostEnrichment) -> Result<(), DomainError>;
    async fn append_usage_entry(&self, entry: &LlmUsageEntry) -> Result<(), DomainError>;
    async fn cost_since(&self, since: DateTime<Utc>) -> Result<MicroUsd, DomainError>;

    // --- hybrid search composite queries ---
    /// Candidate posts matching the hybrid query (full-text OR keyword-array
    /// overlap), filtered by age window and, if set, category/sentiment.
    /// Returns posts already joined to their latest snapshot via a LATERAL
    /// "one row per post" subquery.
    async fn search_candidates(&self, query: &SearchQuery) -> Result<Vec<RankedPost>, DomainError>;

    // --- saved topics ---
    async fn list_saved_topics(&self) -> Result<Vec<SavedTopic>, DomainError>;
    async fn save_topic(
        &self,
        name: &str,
        keywords: &[String],
        sort_mode: SortMode,
    ) -> Result<SavedTopic, DomainError>;
    async fn delete_saved_topic(&self, name: &str) -> Result<(), DomainError>;

    // --- retention ---
    /// Deletes posts older than `older_than`; cascades remove dependent rows.
    /// Runs on its own schedule, independent of the write path.
    async fn sweep_retention(&self, older_than: DateTime<Utc>) -> Result<u64, DomainError>;
}

/// A chat-completion request asking for the enrichment JSON schema.
pub struct EnrichmentPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
}

/// Normalized response from an LLM JSON-mode completion.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub content: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
    pub model: String,
    pub duration_ms: i64,
    pub parsed_json: Option<serde_json::Value>,
}

/// LLM adapter port. Enforces its own rate limit, timeout, and retry policy;
/// callers just await a result.
#[async_trait::async_trait]
pub trait LlmPort: Send + Sync {
    async fn complete_json(
        &self,
        prompt: EnrichmentPrompt,
    ) -> Result<CompletionResult, DomainError>;

    /// Per-model cost estimate in micro-dollars, given token usage.
    fn estimate_cost(&self, prompt_tokens: i32, completion_tokens: i32) -> MicroUsd;
}

/// Result-cache port. All failures are non-fatal to the caller; adapters
/// log and return `Ok`/ignore on the write path rather than propagating.
#[async_trait::async_trait]
pub trait CachePort: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration);
}
