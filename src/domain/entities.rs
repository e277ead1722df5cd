//! Domain entities. Pure data structures for the core business.
//!
//! No Telegram/IO/Postgres types here — these are mapped from adapters.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------

/// A monitored public Telegram channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub telegram_id: i64,
    pub username: String,
    pub title: String,
    pub description: Option<String>,
    pub subscriber_count: i64,
    pub is_active: bool,
    pub last_collected_message_id: Option<i64>,
    pub last_collected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only health log entry for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelHealthStatus {
    Healthy,
    RateLimited,
    Inaccessible,
    Removed,
}

impl ChannelHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelHealthStatus::Healthy => "healthy",
            ChannelHealthStatus::RateLimited => "rate_limited",
            ChannelHealthStatus::Inaccessible => "inaccessible",
            ChannelHealthStatus::Removed => "removed",
        }
    }

    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "rate_limited" => ChannelHealthStatus::RateLimited,
            "inaccessible" => ChannelHealthStatus::Inaccessible,
            "removed" => ChannelHealthStatus::Removed,
            _ => ChannelHealthStatus::Healthy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelHealth {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub status: ChannelHealthStatus,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Post / content / media
// ---------------------------------------------------------------------

/// A single harvested message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub telegram_message_id: i64,
    pub published_at: DateTime<Utc>,
    pub is_forwarded: bool,
    pub forward_from_channel_id: Option<i64>,
    pub forward_from_message_id: Option<i64>,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostContent {
    pub post_id: Uuid,
    pub text_content: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Animation,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Animation => "animation",
        }
    }

    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            "animation" => MediaKind::Animation,
            "document" => MediaKind::Document,
            _ => MediaKind::Photo,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMedia {
    pub id: Uuid,
    pub post_id: Uuid,
    pub kind: MediaKind,
    pub file_id: String,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<i32>,
}

// ---------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub id: Uuid,
    pub post_id: Uuid,
    pub view_count: i64,
    pub forward_count: i64,
    pub reply_count: i64,
    pub reaction_score: f64,
    pub relative_engagement: f64,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionCount {
    pub snapshot_id: Uuid,
    pub emoji: String,
    pub count: i64,
}

/// Per-emoji weight map, unknown emoji default to 1.0. Negative weights
/// (e.g. thumbs-down) are permitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactionWeights(pub BTreeMap<String, f64>);

impl ReactionWeights {
    pub fn weight(&self, emoji: &str) -> f64 {
        self.0.get(emoji).copied().unwrap_or(1.0)
    }

    /// `reaction_score = Σ_emoji count * weight(emoji)` (testable property 4).
    pub fn score<'a>(&self, reactions: impl IntoIterator<Item = (&'a str, i64)>) -> f64 {
        reactions
            .into_iter()
            .map(|(emoji, count)| count as f64 * self.weight(emoji))
            .sum()
    }
}

/// `(views + reaction_score) / max(subscriber_count, 1)`, `0.0` when
/// `subscriber_count == 0` (testable property 5).
pub fn relative_engagement(views: i64, reaction_score: f64, subscriber_count: i64) -> f64 {
    if subscriber_count == 0 {
        return 0.0;
    }
    (views as f64 + reaction_score) / subscriber_count.max(1) as f64
}

// ---------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Politics,
    Economics,
    Technology,
    Sports,
    Entertainment,
    Health,
    Military,
    Crime,
    Society,
    #[default]
    Other,
}

impl Category {
    /// Parses a free-form LLM-supplied category string, defaulting to
    /// `Other` for anything outside the closed enumeration.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "politics" => Category::Politics,
            "economics" => Category::Economics,
            "technology" => Category::Technology,
            "sports" => Category::Sports,
            "entertainment" => Category::Entertainment,
            "health" => Category::Health,
            "military" => Category::Military,
            "crime" => Category::Crime,
            "society" => Category::Society,
            _ => Category::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Economics => "economics",
            Category::Technology => "technology",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Military => "military",
            Category::Crime => "crime",
            Category::Society => "society",
            Category::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// Named-entity extraction result. Missing keys default to an empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    pub persons: BTreeSet<String>,
    pub organizations: BTreeSet<String>,
    pub locations: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostEnrichment {
    pub post_id: Uuid,
    pub explicit_keywords: BTreeSet<String>,
    pub implicit_keywords: BTreeSet<String>,
    pub category: Category,
    pub sentiment: Sentiment,
    pub entities: Entities,
    pub model_used: String,
    pub token_count: i32,
    pub processing_time_ms: i64,
    pub enriched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Saved topics / usage ledger
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTopic {
    pub id: Uuid,
    pub name: String,
    /// Persisted as a JSON array (not comma-joined) so a keyword containing
    /// a comma round-trips losslessly.
    pub keywords: Vec<String>,
    pub sort_mode: SortMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fixed-point USD cost, six decimal places, stored as micro-dollars to
/// avoid float drift in a financial ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MicroUsd(pub i64);

impl MicroUsd {
    pub const ZERO: MicroUsd = MicroUsd(0);

    pub fn from_dollars(dollars: f64) -> Self {
        MicroUsd((dollars * 1_000_000.0).round() as i64)
    }

    pub fn as_dollars(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl std::ops::Add for MicroUsd {
    type Output = MicroUsd;
    fn add(self, rhs: MicroUsd) -> MicroUsd {
        MicroUsd(self.0 + rhs.0)
    }
}

impl std::iter::Sum for MicroUsd {
    fn sum<I: Iterator<Item = MicroUsd>>(iter: I) -> Self {
        iter.fold(MicroUsd::ZERO, |a, b| a + b)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmUsageEntry {
    pub id: Uuid,
    pub model: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
    pub estimated_cost_usd: MicroUsd,
    pub task_name: String,
    pub posts_processed: i32,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Combined,
    Views,
    Reactions,
    Engagement,
    Recency,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Combined => "combined",
            SortMode::Views => "views",
            SortMode::Reactions => "reactions",
            SortMode::Engagement => "engagement",
            SortMode::Recency => "recency",
        }
    }

    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "views" => SortMode::Views,
            "reactions" => SortMode::Reactions,
            "engagement" => SortMode::Engagement,
            "recency" => SortMode::Recency,
            _ => SortMode::Combined,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keywords: Vec<String>,
    pub max_age_hours: u32,
    pub sort_mode: SortMode,
    pub category: Option<Category>,
    pub sentiment: Option<Sentiment>,
    pub include_enrichment: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            max_age_hours: 24,
            sort_mode: SortMode::Combined,
            category: None,
            sentiment: None,
            include_enrichment: true,
            limit: 20,
            offset: 0,
        }
    }
}

/// A candidate post plus the metrics the ranker needs. What SearchEngine
/// hands to Ranker, and what Ranker hands back (reordered) to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPost {
    pub post: Post,
    pub content: Option<PostContent>,
    pub enrichment: Option<PostEnrichment>,
    pub view_count: i64,
    pub forward_count: i64,
    pub reply_count: i64,
    pub reaction_score: f64,
    pub relative_engagement: f64,
    pub combined_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultPage {
    pub posts: Vec<RankedPost>,
    pub limit: u32,
    pub offset: u32,
}

impl SearchResultPage {
    pub fn empty(limit: u32, offset: u32) -> Self {
        Self {
            posts: Vec::new(),
            limit,
            offset,
        }
    }
}

// ---------------------------------------------------------------------
// Telegram adapter DTOs
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub telegram_id: i64,
    pub username: String,
    pub title: String,
    pub description: Option<String>,
    pub subscriber_count: i64,
}

#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Found(ChannelInfo),
    NotFound,
    Private,
}

#[derive(Debug, Clone)]
pub struct ForwardOrigin {
    pub channel_id: Option<i64>,
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub kind: MediaKind,
    pub file_id: String,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<i32>,
}

/// One message as extracted by the Telegram adapter, before it has a
/// `Post`/`PostContent`/etc. identity assigned by the Store.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub telegram_message_id: i64,
    pub published_at: DateTime<Utc>,
    pub text: Option<String>,
    pub language: Option<String>,
    pub media: Vec<FetchedMedia>,
    pub forward_origin: Option<ForwardOrigin>,
    pub view_count: i64,
    pub forward_count: i64,
    pub reply_count: i64,
    /// emoji -> count, never collapsed into a total.
    pub reactions: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    pub messages: Vec<FetchedMessage>,
    pub max_message_id: Option<i64>,
}

// ---------------------------------------------------------------------
// Collection / enrichment reports
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionStatus {
    Collected,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct CollectionError {
    pub telegram_message_id: i64,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub status: CollectionStatus,
    pub posts_collected: usize,
    pub skipped_duplicates: usize,
    pub errors: Vec<CollectionError>,
    pub elapsed: Duration,
}

impl CollectionReport {
    pub fn skipped() -> Self {
        Self {
            status: CollectionStatus::Skipped,
            posts_collected: 0,
            skipped_duplicates: 0,
            errors: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoText,
    AlreadyEnriched,
}

#[derive(Debug, Clone)]
pub enum EnrichmentOutcome {
    Completed(PostEnrichment),
    Skipped(SkipReason),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub completed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------
// Scheduler reports
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ManualTarget {
    AllChannels,
    Channel(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerReport {
    pub channels_processed: usize,
    pub posts_collected: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_score_sums_weighted_counts() {
        let mut weights = BTreeMap::new();
        weights.insert("❤".to_string(), 2.0);
        weights.insert("👎".to_string(), -1.0);
        let weights = ReactionWeights(weights);

        let score = weights.score([("❤", 10), ("👎", 3), ("🔥", 5)]);
        // 10*2.0 + 3*-1.0 + 5*1.0 (unknown emoji defaults to 1.0)
        assert_eq!(score, 22.0);
    }

    #[test]
    fn relative_engagement_zero_subscribers_is_zero() {
        assert_eq!(relative_engagement(1200, 20.0, 0), 0.0);
    }

    #[test]
    fn relative_engagement_matches_formula() {
        let re = relative_engagement(1200, 20.0, 10_000);
        assert!((re - 0.122).abs() < 1e-9);
    }

    #[test]
    fn category_parse_defaults_to_other() {
        assert_eq!(Category::parse_or_default("politics"), Category::Politics);
        assert_eq!(Category::parse_or_default("nonsense"), Category::Other);
        assert_eq!(Category::parse_or_default("POLITICS"), Category::Politics);
    }

    #[test]
    fn sentiment_parse_defaults_to_neutral() {
        assert_eq!(Sentiment::parse_or_default("negative"), Sentiment::Negative);
        assert_eq!(Sentiment::parse_or_default("???"), Sentiment::Neutral);
    }

    #[test]
    fn micro_usd_round_trips_dollars() {
        let cost = MicroUsd::from_dollars(0.10);
        assert_eq!(cost.0, 100_000);
        assert!((cost.as_dollars() - 0.10).abs() < 1e-9);
    }
}
