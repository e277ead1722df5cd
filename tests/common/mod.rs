//! In-memory fakes for the outbound ports, shared across integration tests.
//! No database or network; exercises the use-case logic against the trait
//! boundary the way production adapters would be exercised, minus I/O.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tnse::domain::*;
use tnse::ports::outbound::{
    CachePort, CollectedPost, CompletionResult, EnrichmentPrompt, LlmPort, Store, TelegramAdapter,
    WriteOutcome,
};
use uuid::Uuid;

#[derive(Default)]
struct FakeStoreState {
    channels: HashMap<Uuid, Channel>,
    posts: HashMap<Uuid, Post>,
    post_by_key: HashMap<(Uuid, i64), Uuid>,
    content: HashMap<Uuid, PostContent>,
    snapshots: HashMap<Uuid, Vec<EngagementSnapshot>>,
    reaction_counts: HashMap<Uuid, Vec<ReactionCount>>,
    enrichments: HashMap<Uuid, PostEnrichment>,
    usage: Vec<LlmUsageEntry>,
    saved_topics: HashMap<String, SavedTopic>,
    health: HashMap<Uuid, Vec<ChannelHealth>>,
}

/// In-memory stand-in for `PostgresStore`. Enough fidelity to exercise
/// dedup, cursor persistence, cost-ledger summation, and the enrichment
/// backlog query without a real database.
pub struct FakeStore {
    state: Mutex<FakeStoreState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeStoreState::default()),
        }
    }

    pub fn seed_channel(&self, channel: Channel) {
        self.state.lock().unwrap().channels.insert(channel.id, channel);
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().unwrap().posts.len()
    }

    pub fn seed_usage(&self, entry: LlmUsageEntry) {
        self.state.lock().unwrap().usage.push(entry);
    }

    pub fn usage_len(&self) -> usize {
        self.state.lock().unwrap().usage.len()
    }

    pub fn post_id_for(&self, channel_id: Uuid, telegram_message_id: i64) -> Option<Uuid> {
        self.state
            .lock()
            .unwrap()
            .post_by_key
            .get(&(channel_id, telegram_message_id))
            .copied()
    }

    pub fn latest_snapshot_sync(&self, post_id: Uuid) -> Option<EngagementSnapshot> {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .get(&post_id)
            .and_then(|snaps| snaps.iter().max_by_key(|s| s.collected_at).cloned())
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>, DomainError> {
        Ok(self.state.lock().unwrap().channels.get(&channel_id).cloned())
    }

    async fn get_channel_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Channel>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .values()
            .find(|c| c.telegram_id == telegram_id)
            .cloned())
    }

    async fn list_active_channels(&self) -> Result<Vec<Channel>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_channel(&self, channel: &Channel) -> Result<Channel, DomainError> {
        let mut state = self.state.lock().unwrap();
        state.channels.insert(channel.id, channel.clone());
        Ok(channel.clone())
    }

    async fn deactivate_channel(&self, channel_id: Uuid) -> Result<(), DomainError> {
        if let Some(c) = self.state.lock().unwrap().channels.get_mut(&channel_id) {
            c.is_active = false;
        }
        Ok(())
    }

    async fn record_channel_health(
        &self,
        channel_id: Uuid,
        status: ChannelHealthStatus,
        error_message: Option<&str>,
    ) -> Result<(), DomainError> {
        self.state
            .lock()
            .unwrap()
            .health
            .entry(channel_id)
            .or_default()
            .push(ChannelHealth {
                id: Uuid::new_v4(),
                channel_id,
                status,
                error_message: error_message.map(|s| s.to_string()),
                recorded_at: Utc::now(),
            });
        Ok(())
    }

    async fn channel_health(&self, channel_id: Uuid) -> Result<Option<ChannelHealth>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .health
            .get(&channel_id)
            .and_then(|log| log.last().cloned()))
    }

    async fn write_collection_batch(
        &self,
        channel_id: Uuid,
        posts: Vec<CollectedPost>,
        new_cursor: Option<i64>,
    ) -> Result<Vec<Result<WriteOutcome, DomainError>>, DomainError> {
        let mut state = self.state.lock().unwrap();
        let mut outcomes = Vec::with_capacity(posts.len());

        for post in posts {
            let key = (channel_id, post.telegram_message_id);
            if state.post_by_key.contains_key(&key) {
                outcomes.push(Ok(WriteOutcome::Duplicate));
                continue;
            }

            let post_id = Uuid::new_v4();
            state.post_by_key.insert(key, post_id);
            state.posts.insert(
                post_id,
                Post {
                    id: post_id,
                    channel_id,
                    telegram_message_id: post.telegram_message_id,
                    published_at: post.published_at,
                    is_forwarded: post.is_forwarded,
                    forward_from_channel_id: post.forward_from_channel_id,
                    forward_from_message_id: post.forward_from_message_id,
                    collected_at: Utc::now(),
                },
            );
            state.content.insert(
                post_id,
                PostContent {
                    post_id,
                    text_content: post.text_content.clone().unwrap_or_default(),
                    language: post.language.clone(),
                },
            );

            let snapshot_id = Uuid::new_v4();
            state.snapshots.entry(post_id).or_default().push(EngagementSnapshot {
                id: snapshot_id,
                post_id,
                view_count: post.view_count,
                forward_count: post.forward_count,
                reply_count: post.reply_count,
                reaction_score: post.reaction_score,
                relative_engagement: post.relative_engagement,
                collected_at: Utc::now(),
            });
            state.reaction_counts.insert(
                snapshot_id,
                post.reactions
                    .iter()
                    .map(|(emoji, count)| ReactionCount {
                        snapshot_id,
                        emoji: emoji.clone(),
                        count: *count,
                    })
                    .collect(),
            );

            outcomes.push(Ok(WriteOutcome::Inserted));
        }

        if let Some(cursor) = new_cursor {
            if let Some(channel) = state.channels.get_mut(&channel_id) {
                channel.last_collected_message_id = Some(cursor);
                channel.last_collected_at = Some(Utc::now());
            }
        }

        Ok(outcomes)
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>, DomainError> {
        Ok(self.state.lock().unwrap().posts.get(&post_id).cloned())
    }

    async fn get_post_content(&self, post_id: Uuid) -> Result<Option<PostContent>, DomainError> {
        Ok(self.state.lock().unwrap().content.get(&post_id).cloned())
    }

    async fn latest_snapshot(&self, post_id: Uuid) -> Result<Option<EngagementSnapshot>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .snapshots
            .get(&post_id)
            .and_then(|snaps| snaps.iter().max_by_key(|s| s.collected_at).cloned()))
    }

    async fn reaction_counts(&self, snapshot_id: Uuid) -> Result<Vec<ReactionCount>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .reaction_counts
            .get(&snapshot_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn posts_pending_enrichment(&self, limit: u32) -> Result<Vec<Post>, DomainError> {
        let state = self.state.lock().unwrap();
        let mut pending: Vec<Post> = state
            .posts
            .values()
            .filter(|p| {
                state
                    .content
                    .get(&p.id)
                    .is_some_and(|c| !c.text_content.trim().is_empty())
                    && !state.enrichments.contains_key(&p.id)
            })
            .cloned()
            .collect();
        pending.sort_by_key(|p| p.published_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn get_enrichment(&self, post_id: Uuid) -> Result<Option<PostEnrichment>, DomainError> {
        Ok(self.state.lock().unwrap().enrichments.get(&post_id).cloned())
    }

    async fn save_enrichment(&self, enrichment: &PostEnrichment) -> Result<(), DomainError> {
        self.state
            .lock()
            .unwrap()
            .enrichments
            .insert(enrichment.post_id, enrichment.clone());
        Ok(())
    }

    async fn append_usage_entry(&self, entry: &LlmUsageEntry) -> Result<(), DomainError> {
        self.state.lock().unwrap().usage.push(entry.clone());
        Ok(())
    }

    async fn cost_since(&self, since: DateTime<Utc>) -> Result<MicroUsd, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .usage
            .iter()
            .filter(|e| e.created_at >= since)
            .map(|e| e.estimated_cost_usd)
            .sum())
    }

    async fn search_candidates(&self, query: &SearchQuery) -> Result<Vec<RankedPost>, DomainError> {
        let state = self.state.lock().unwrap();
        let since = Utc::now() - chrono::Duration::hours(query.max_age_hours as i64);
        let keyword_set: std::collections::HashSet<&str> =
            query.keywords.iter().map(|k| k.as_str()).collect();

        let mut out = Vec::new();
        for post in state.posts.values() {
            if post.published_at < since {
                continue;
            }
            let content = state.content.get(&post.id).cloned();
            let enrichment = state.enrichments.get(&post.id).cloned();

            let text_match = content
                .as_ref()
                .map(|c| keyword_set.iter().any(|k| c.text_content.to_lowercase().contains(k)))
                .unwrap_or(false);
            let keyword_match = query.include_enrichment
                && enrichment.as_ref().is_some_and(|e| {
                    e.explicit_keywords.iter().any(|k| keyword_set.contains(k.as_str()))
                        || e.implicit_keywords.iter().any(|k| keyword_set.contains(k.as_str()))
                });

            if !text_match && !keyword_match {
                continue;
            }
            if let Some(cat) = query.category {
                if enrichment.as_ref().map(|e| e.category) != Some(cat) {
                    continue;
                }
            }
            if let Some(sent) = query.sentiment {
                if enrichment.as_ref().map(|e| e.sentiment) != Some(sent) {
                    continue;
                }
            }

            let snapshot = state
                .snapshots
                .get(&post.id)
                .and_then(|snaps| snaps.iter().max_by_key(|s| s.collected_at).cloned());

            out.push(RankedPost {
                post: post.clone(),
                content,
                enrichment,
                view_count: snapshot.as_ref().map(|s| s.view_count).unwrap_or(0),
                forward_count: snapshot.as_ref().map(|s| s.forward_count).unwrap_or(0),
                reply_count: snapshot.as_ref().map(|s| s.reply_count).unwrap_or(0),
                reaction_score: snapshot.as_ref().map(|s| s.reaction_score).unwrap_or(0.0),
                relative_engagement: snapshot.as_ref().map(|s| s.relative_engagement).unwrap_or(0.0),
                combined_score: 0.0,
            });
        }
        Ok(out)
    }

    async fn list_saved_topics(&self) -> Result<Vec<SavedTopic>, DomainError> {
        Ok(self.state.lock().unwrap().saved_topics.values().cloned().collect())
    }

    async fn save_topic(
        &self,
        name: &str,
        keywords: &[String],
        sort_mode: SortMode,
    ) -> Result<SavedTopic, DomainError> {
        let now = Utc::now();
        let topic = SavedTopic {
            id: Uuid::new_v4(),
            name: name.to_string(),
            keywords: keywords.to_vec(),
            sort_mode,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .saved_topics
            .insert(name.to_string(), topic.clone());
        Ok(topic)
    }

    async fn delete_saved_topic(&self, name: &str) -> Result<(), DomainError> {
        self.state.lock().unwrap().saved_topics.remove(name);
        Ok(())
    }

    async fn sweep_retention(&self, older_than: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut state = self.state.lock().unwrap();
        let doomed: Vec<Uuid> = state
            .posts
            .values()
            .filter(|p| p.published_at < older_than)
            .map(|p| p.id)
            .collect();
        for id in &doomed {
            state.posts.remove(id);
            state.content.remove(id);
            state.snapshots.remove(id);
            state.enrichments.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

/// Fixed list of messages, filtered by `min_id`/`max_age` the way the real
/// Telegram adapter's contract requires.
pub struct FakeTelegramAdapter {
    messages: Mutex<Vec<FetchedMessage>>,
}

impl FakeTelegramAdapter {
    pub fn new(messages: Vec<FetchedMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
        }
    }

    pub fn push(&self, message: FetchedMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

#[async_trait]
impl TelegramAdapter for FakeTelegramAdapter {
    async fn resolve(&self, _identifier: &str) -> Result<ResolveOutcome, DomainError> {
        Ok(ResolveOutcome::NotFound)
    }

    async fn fetch_messages(
        &self,
        _telegram_channel_id: i64,
        min_id: i64,
        max_age: std::time::Duration,
        limit: i32,
    ) -> Result<FetchBatch, DomainError> {
        let min_id = min_id.max(0);
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default();
        let mut messages: Vec<FetchedMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.telegram_message_id > min_id && m.published_at >= cutoff)
            .cloned()
            .collect();
        messages.truncate(limit.max(0) as usize);
        let max_message_id = messages.iter().map(|m| m.telegram_message_id).max();
        Ok(FetchBatch {
            messages,
            max_message_id,
        })
    }
}

/// Scripted LLM responses, one per call, consumed in order.
pub struct FakeLlm {
    responses: Mutex<Vec<Result<CompletionResult, DomainError>>>,
    cost_per_call: MicroUsd,
    calls: std::sync::atomic::AtomicUsize,
}

impl FakeLlm {
    pub fn new(responses: Vec<Result<CompletionResult, DomainError>>, cost_per_call: MicroUsd) -> Self {
        Self {
            responses: Mutex::new(responses),
            cost_per_call,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmPort for FakeLlm {
    async fn complete_json(&self, _prompt: EnrichmentPrompt) -> Result<CompletionResult, DomainError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(DomainError::Ai("no scripted response left".to_string()));
        }
        responses.remove(0)
    }

    fn estimate_cost(&self, _prompt_tokens: i32, _completion_tokens: i32) -> MicroUsd {
        self.cost_per_call
    }
}

pub struct FakeCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CachePort for FakeCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &[u8], _ttl: std::time::Duration) {
        self.entries.lock().unwrap().insert(key.to_string(), value.to_vec());
    }
}

pub fn channel_fixture(telegram_id: i64, subscriber_count: i64) -> Channel {
    Channel {
        id: Uuid::new_v4(),
        telegram_id,
        username: "testchannel".to_string(),
        title: "Test Channel".to_string(),
        description: None,
        subscriber_count,
        is_active: true,
        last_collected_message_id: None,
        last_collected_at: None,
        created_at: Utc::now(),
    }
}

pub fn message_fixture(id: i64, view_count: i64, reactions: &[(&str, i64)]) -> FetchedMessage {
    FetchedMessage {
        telegram_message_id: id,
        published_at: Utc::now(),
        text: Some(format!("message {id}")),
        language: Some("en".to_string()),
        media: Vec::new(),
        forward_origin: None,
        view_count,
        forward_count: 0,
        reply_count: 0,
        reactions: reactions.iter().map(|(e, c)| (e.to_string(), *c)).collect(),
    }
}
