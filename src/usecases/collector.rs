//! Per-channel collection. Fetches messages newer than the channel's
//! resume cursor, scores their engagement, and writes posts/content/media
//! in one batch, advancing the cursor only on success.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::domain::{
    ChannelHealthStatus, CollectionError, CollectionReport, CollectionStatus, DomainError,
    ReactionWeights, relative_engagement,
};
use crate::ports::outbound::{CollectedPost, Store, TelegramAdapter, WriteOutcome};

pub struct Collector<T: TelegramAdapter, S: Store> {
    telegram: std::sync::Arc<T>,
    store: std::sync::Arc<S>,
    weights: ReactionWeights,
    max_age: Duration,
    fetch_limit: i32,
}

impl<T: TelegramAdapter, S: Store> Collector<T, S> {
    pub fn new(
        telegram: std::sync::Arc<T>,
        store: std::sync::Arc<S>,
        weights: ReactionWeights,
        max_age: Duration,
        fetch_limit: i32,
    ) -> Self {
        Self {
            telegram,
            store,
            weights,
            max_age,
            fetch_limit,
        }
    }

    pub async fn collect_channel(&self, channel_id: Uuid) -> Result<CollectionReport, DomainError> {
        let started = Instant::now();
        let Some(channel) = self.store.get_channel(channel_id).await? else {
            return Err(DomainError::Validation(format!("unknown channel {channel_id}")));
        };
        if !channel.is_active {
            return Ok(CollectionReport::skipped());
        }

        let min_id = channel.last_collected_message_id.unwrap_or(0).max(0);
        let batch = match self
            .telegram
            .fetch_messages(channel.telegram_id, min_id, self.max_age, self.fetch_limit)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                let status = match &e {
                    DomainError::FloodWait { .. } => ChannelHealthStatus::RateLimited,
                    DomainError::Permanent(_) => ChannelHealthStatus::Inaccessible,
                    _ => ChannelHealthStatus::Inaccessible,
                };
                let _ = self
                    .store
                    .record_channel_health(channel_id, status, Some(&e.to_string()))
                    .await;
                return Err(e);
            }
        };

        self.store
            .record_channel_health(channel_id, ChannelHealthStatus::Healthy, None)
            .await?;

        if batch.messages.is_empty() {
            return Ok(CollectionReport {
                status: CollectionStatus::Collected,
                posts_collected: 0,
                skipped_duplicates: 0,
                errors: Vec::new(),
                elapsed: started.elapsed(),
            });
        }

        let collected: Vec<CollectedPost> = batch
            .messages
            .iter()
            .map(|msg| {
                let reaction_score = self.weights.score(msg.reactions.iter().map(|(e, c)| (e.as_str(), *c)));
                let relative_engagement =
                    relative_engagement(msg.view_count, reaction_score, channel.subscriber_count);
                CollectedPost {
                    telegram_message_id: msg.telegram_message_id,
                    published_at: msg.published_at,
                    is_forwarded: msg.forward_origin.is_some(),
                    forward_from_channel_id: msg.forward_origin.as_ref().and_then(|f| f.channel_id),
                    forward_from_message_id: msg.forward_origin.as_ref().and_then(|f| f.message_id),
                    text_content: msg.text.clone(),
                    language: msg.language.clone(),
                    media: msg
                        .media
                        .iter()
                        .map(|m| crate::domain::PostMedia {
                            id: Uuid::new_v4(),
                            post_id: Uuid::nil(),
                            kind: m.kind,
                            file_id: m.file_id.clone(),
                            size_bytes: m.size_bytes,
                            mime_type: m.mime_type.clone(),
                            width: m.width,
                            height: m.height,
                            duration_secs: m.duration_secs,
                        })
                        .collect(),
                    view_count: msg.view_count,
                    forward_count: msg.forward_count,
                    reply_count: msg.reply_count,
                    reaction_score,
                    relative_engagement,
                    reactions: msg.reactions.iter().map(|(e, c)| (e.clone(), *c)).collect(),
                }
            })
            .collect();

        let telegram_message_ids: Vec<i64> = collected.iter().map(|p| p.telegram_message_id).collect();
        let outcomes = self
            .store
            .write_collection_batch(channel_id, collected, batch.max_message_id)
            .await?;

        let mut posts_collected = 0usize;
        let mut skipped_duplicates = 0usize;
        let mut errors = Vec::new();
        for (telegram_message_id, outcome) in telegram_message_ids.into_iter().zip(outcomes) {
            match outcome {
                Ok(WriteOutcome::Inserted) => posts_collected += 1,
                Ok(WriteOutcome::Duplicate) => skipped_duplicates += 1,
                Err(e) => errors.push(CollectionError {
                    telegram_message_id,
                    message: e.to_string(),
                }),
            }
        }

        Ok(CollectionReport {
            status: CollectionStatus::Collected,
            posts_collected,
            skipped_duplicates,
            errors,
            elapsed: started.elapsed(),
        })
    }
}
