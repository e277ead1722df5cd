//! Postgres-backed `Store`. One `posts` row per harvested message, a
//! strictly append-only `engagement_snapshots` history, and GIN-indexed
//! columns (`migrations/0002_search_indexes.sql`) backing the hybrid
//! full-text/keyword-array search.
//!
//! Writes a collection batch message-by-message inside one transaction,
//! using a `SAVEPOINT` per message so one bad message doesn't lose its
//! siblings — Postgres otherwise aborts the whole transaction on the first
//! constraint violation.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::types::Json;
use tokio_postgres::{Config as PgConfig, Row, Transaction};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::store::migrations::MIGRATIONS;
use crate::domain::{
    Category, Channel, ChannelHealth, ChannelHealthStatus, DomainError, EngagementSnapshot,
    LlmUsageEntry, MicroUsd, Post, PostContent, PostEnrichment, RankedPost, ReactionCount,
    SavedTopic, SearchQuery, Sentiment, SortMode,
};
use crate::ports::outbound::{CollectedPost, Store, WriteOutcome};

pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Builds the connection pool over TLS and applies any pending
    /// migrations. Call once at startup; the store is safe to share via Arc.
    pub async fn connect(database_url: &str) -> Result<Self, DomainError> {
        let pg_config = PgConfig::from_str(database_url)
            .map_err(|e| DomainError::Configuration(format!("invalid database url: {e}")))?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let tls = MakeRustlsConnect::new(tls_config);

        let manager = Manager::from_config(
            pg_config,
            tls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(16)
            .build()
            .map_err(|e| DomainError::Repo(format!("build pool: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (\
                    version INTEGER PRIMARY KEY, \
                    name TEXT NOT NULL, \
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT now())",
            )
            .await
            .map_err(map_pg)?;

        for migration in MIGRATIONS {
            let already_applied = client
                .query_opt(
                    "SELECT 1 FROM schema_migrations WHERE version = $1",
                    &[&migration.version],
                )
                .await
                .map_err(map_pg)?
                .is_some();
            if already_applied {
                continue;
            }
            info!(version = migration.version, name = migration.name, "applying migration");
            client.batch_execute(migration.sql).await.map_err(map_pg)?;
            client
                .execute(
                    "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)",
                    &[&migration.version, &migration.name],
                )
                .await
                .map_err(map_pg)?;
        }
        Ok(())
    }
}

fn map_pg(e: tokio_postgres::Error) -> DomainError {
    DomainError::Repo(e.to_string())
}

fn map_pool(e: deadpool_postgres::PoolError) -> DomainError {
    DomainError::Repo(format!("pool: {e}"))
}

fn row_to_channel(row: &Row) -> Channel {
    Channel {
        id: row.get("id"),
        telegram_id: row.get("telegram_id"),
        username: row.get("username"),
        title: row.get("title"),
        description: row.get("description"),
        subscriber_count: row.get("subscriber_count"),
        is_active: row.get("is_active"),
        last_collected_message_id: row.get("last_collected_message_id"),
        last_collected_at: row.get("last_collected_at"),
        created_at: row.get("created_at"),
    }
}

fn row_to_post(row: &Row) -> Post {
    Post {
        id: row.get("id"),
        channel_id: row.get("channel_id"),
        telegram_message_id: row.get("telegram_message_id"),
        published_at: row.get("published_at"),
        is_forwarded: row.get("is_forwarded"),
        forward_from_channel_id: row.get("forward_from_channel_id"),
        forward_from_message_id: row.get("forward_from_message_id"),
        collected_at: row.get("collected_at"),
    }
}

fn row_to_snapshot(row: &Row) -> EngagementSnapshot {
    EngagementSnapshot {
        id: row.get("id"),
        post_id: row.get("post_id"),
        view_count: row.get("view_count"),
        forward_count: row.get("forward_count"),
        reply_count: row.get("reply_count"),
        reaction_score: row.get("reaction_score"),
        relative_engagement: row.get("relative_engagement"),
        collected_at: row.get("collected_at"),
    }
}

fn row_to_enrichment(row: &Row) -> PostEnrichment {
    let explicit: Vec<String> = row.get("explicit_keywords");
    let implicit: Vec<String> = row.get("implicit_keywords");
    let entities_json: serde_json::Value = row.get("entities");
    PostEnrichment {
        post_id: row.get("post_id"),
        explicit_keywords: explicit.into_iter().collect(),
        implicit_keywords: implicit.into_iter().collect(),
        category: Category::parse_or_default(row.get::<_, &str>("category")),
        sentiment: Sentiment::parse_or_default(row.get::<_, &str>("sentiment")),
        entities: serde_json::from_value(entities_json).unwrap_or_default(),
        model_used: row.get("model_used"),
        token_count: row.get("token_count"),
        processing_time_ms: row.get("processing_time_ms"),
        enriched_at: row.get("enriched_at"),
    }
}

fn row_to_saved_topic(row: &Row) -> SavedTopic {
    let Json(keywords): Json<Vec<String>> = row.get("keywords");
    SavedTopic {
        id: row.get("id"),
        name: row.get("name"),
        keywords,
        sort_mode: SortMode::parse_or_default(row.get::<_, &str>("sort_mode")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_ranked_post(row: &Row) -> RankedPost {
    let post = row_to_post(row);

    let content = row
        .get::<_, Option<String>>("text_content")
        .map(|text_content| PostContent {
            post_id: post.id,
            text_content,
            language: row.get("language"),
        });

    let enrichment = row
        .get::<_, Option<Uuid>>("enrichment_post_id")
        .map(|post_id| {
            let explicit: Vec<String> = row.get("explicit_keywords");
            let implicit: Vec<String> = row.get("implicit_keywords");
            let entities_json: serde_json::Value = row.get("entities");
            PostEnrichment {
                post_id,
                explicit_keywords: explicit.into_iter().collect(),
                implicit_keywords: implicit.into_iter().collect(),
                category: Category::parse_or_default(row.get::<_, &str>("category")),
                sentiment: Sentiment::parse_or_default(row.get::<_, &str>("sentiment")),
                entities: serde_json::from_value(entities_json).unwrap_or_default(),
                model_used: row.get("model_used"),
                token_count: row.get("token_count"),
                processing_time_ms: row.get("processing_time_ms"),
                enriched_at: row.get("enriched_at"),
            }
        });

    RankedPost {
        post,
        content,
        enrichment,
        view_count: row.get("view_count"),
        forward_count: row.get("forward_count"),
        reply_count: row.get("reply_count"),
        reaction_score: row.get("reaction_score"),
        relative_engagement: row.get("relative_engagement"),
        combined_score: 0.0,
    }
}

/// Inserts one post and its content/media/engagement rows. `ON CONFLICT DO
/// NOTHING` on the `(channel_id, telegram_message_id)` unique index makes a
/// re-collected message a no-op `Duplicate` rather than an error.
async fn write_one_post(
    tx: &Transaction<'_>,
    channel_id: Uuid,
    post: &CollectedPost,
) -> Result<WriteOutcome, DomainError> {
    let candidate_id = Uuid::new_v4();
    let inserted = tx
        .query_opt(
            r#"
            INSERT INTO posts
                (id, channel_id, telegram_message_id, published_at, is_forwarded,
                 forward_from_channel_id, forward_from_message_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (channel_id, telegram_message_id) DO NOTHING
            RETURNING id
            "#,
            &[
                &candidate_id,
                &channel_id,
                &post.telegram_message_id,
                &post.published_at,
                &post.is_forwarded,
                &post.forward_from_channel_id,
                &post.forward_from_message_id,
            ],
        )
        .await
        .map_err(map_pg)?;

    let Some(row) = inserted else {
        return Ok(WriteOutcome::Duplicate);
    };
    let post_id: Uuid = row.get("id");

    tx.execute(
        "INSERT INTO post_content (post_id, text_content, language) VALUES ($1, $2, $3)",
        &[
            &post_id,
            &post.text_content.clone().unwrap_or_default(),
            &post.language,
        ],
    )
    .await
    .map_err(map_pg)?;

    for media in &post.media {
        let kind = media.kind.as_str();
        tx.execute(
            r#"
            INSERT INTO post_media
                (id, post_id, kind, file_id, size_bytes, mime_type, width, height, duration_secs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            &[
                &Uuid::new_v4(),
                &post_id,
                &kind,
                &media.file_id,
                &media.size_bytes,
                &media.mime_type,
                &media.width,
                &media.height,
                &media.duration_secs,
            ],
        )
        .await
        .map_err(map_pg)?;
    }

    let snapshot_id = Uuid::new_v4();
    tx.execute(
        r#"
        INSERT INTO engagement_snapshots
            (id, post_id, view_count, forward_count, reply_count, reaction_score, relative_engagement)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
        &[
            &snapshot_id,
            &post_id,
            &post.view_count,
            &post.forward_count,
            &post.reply_count,
            &post.reaction_score,
            &post.relative_engagement,
        ],
    )
    .await
    .map_err(map_pg)?;

    for (emoji, count) in &post.reactions {
        tx.execute(
            "INSERT INTO reaction_counts (snapshot_id, emoji, count) VALUES ($1, $2, $3)",
            &[&snapshot_id, emoji, count],
        )
        .await
        .map_err(map_pg)?;
    }

    Ok(WriteOutcome::Inserted)
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_opt("SELECT * FROM channels WHERE id = $1", &[&channel_id])
            .await
            .map_err(map_pg)?;
        Ok(row.as_ref().map(row_to_channel))
    }

    async fn get_channel_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Channel>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_opt("SELECT * FROM channels WHERE telegram_id = $1", &[&telegram_id])
            .await
            .map_err(map_pg)?;
        Ok(row.as_ref().map(row_to_channel))
    }

    async fn list_active_channels(&self) -> Result<Vec<Channel>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let rows = client
            .query("SELECT * FROM channels WHERE is_active ORDER BY title", &[])
            .await
            .map_err(map_pg)?;
        Ok(rows.iter().map(row_to_channel).collect())
    }

    async fn upsert_channel(&self, channel: &Channel) -> Result<Channel, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_one(
                r#"
                INSERT INTO channels
                    (id, telegram_id, username, title, description, subscriber_count,
                     is_active, last_collected_message_id, last_collected_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (telegram_id) DO UPDATE SET
                    username = EXCLUDED.username,
                    title = EXCLUDED.title,
                    description = EXCLUDED.description,
                    subscriber_count = EXCLUDED.subscriber_count,
                    is_active = EXCLUDED.is_active
                RETURNING *
                "#,
                &[
                    &channel.id,
                    &channel.telegram_id,
                    &channel.username,
                    &channel.title,
                    &channel.description,
                    &channel.subscriber_count,
                    &channel.is_active,
                    &channel.last_collected_message_id,
                    &channel.last_collected_at,
                    &channel.created_at,
                ],
            )
            .await
            .map_err(map_pg)?;
        Ok(row_to_channel(&row))
    }

    async fn deactivate_channel(&self, channel_id: Uuid) -> Result<(), DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        client
            .execute("UPDATE channels SET is_active = FALSE WHERE id = $1", &[&channel_id])
            .await
            .map_err(map_pg)?;
        Ok(())
    }

    async fn record_channel_health(
        &self,
        channel_id: Uuid,
        status: ChannelHealthStatus,
        error_message: Option<&str>,
    ) -> Result<(), DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let status_str = status.as_str();
        client
            .execute(
                "INSERT INTO channel_health (id, channel_id, status, error_message) \
                 VALUES ($1, $2, $3, $4)",
                &[&Uuid::new_v4(), &channel_id, &status_str, &error_message],
            )
            .await
            .map_err(map_pg)?;
        Ok(())
    }

    async fn channel_health(&self, channel_id: Uuid) -> Result<Option<ChannelHealth>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_opt(
                "SELECT * FROM channel_health WHERE channel_id = $1 \
                 ORDER BY recorded_at DESC LIMIT 1",
                &[&channel_id],
            )
            .await
            .map_err(map_pg)?;
        Ok(row.as_ref().map(|r| ChannelHealth {
            id: r.get("id"),
            channel_id: r.get("channel_id"),
            status: ChannelHealthStatus::parse_or_default(r.get::<_, &str>("status")),
            error_message: r.get("error_message"),
            recorded_at: r.get("recorded_at"),
        }))
    }

    async fn write_collection_batch(
        &self,
        channel_id: Uuid,
        posts: Vec<CollectedPost>,
        new_cursor: Option<i64>,
    ) -> Result<Vec<Result<WriteOutcome, DomainError>>, DomainError> {
        let mut client = self.pool.get().await.map_err(map_pool)?;
        let transaction = client.transaction().await.map_err(map_pg)?;
        let mut outcomes = Vec::with_capacity(posts.len());

        for (idx, post) in posts.iter().enumerate() {
            let savepoint = transaction
                .savepoint(&format!("sp_{idx}"))
                .await
                .map_err(map_pg)?;
            match write_one_post(&savepoint, channel_id, post).await {
                Ok(outcome) => {
                    savepoint.commit().await.map_err(map_pg)?;
                    outcomes.push(Ok(outcome));
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        telegram_message_id = post.telegram_message_id,
                        "failed to write post, rolling back to savepoint"
                    );
                    // Dropping the savepoint without committing rolls it back;
                    // sibling inserts in the outer transaction are untouched.
                    outcomes.push(Err(e));
                }
            }
        }

        if let Some(cursor) = new_cursor {
            transaction
                .execute(
                    "UPDATE channels SET last_collected_message_id = $1, last_collected_at = now() \
                     WHERE id = $2",
                    &[&cursor, &channel_id],
                )
                .await
                .map_err(map_pg)?;
        }

        transaction.commit().await.map_err(map_pg)?;
        Ok(outcomes)
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_opt("SELECT * FROM posts WHERE id = $1", &[&post_id])
            .await
            .map_err(map_pg)?;
        Ok(row.as_ref().map(row_to_post))
    }

    async fn get_post_content(&self, post_id: Uuid) -> Result<Option<PostContent>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_opt("SELECT * FROM post_content WHERE post_id = $1", &[&post_id])
            .await
            .map_err(map_pg)?;
        Ok(row.as_ref().map(|r| PostContent {
            post_id: r.get("post_id"),
            text_content: r.get("text_content"),
            language: r.get("language"),
        }))
    }

    async fn latest_snapshot(
        &self,
        post_id: Uuid,
    ) -> Result<Option<EngagementSnapshot>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_opt(
                "SELECT * FROM engagement_snapshots WHERE post_id = $1 \
                 ORDER BY collected_at DESC LIMIT 1",
                &[&post_id],
            )
            .await
            .map_err(map_pg)?;
        Ok(row.as_ref().map(row_to_snapshot))
    }

    async fn reaction_counts(&self, snapshot_id: Uuid) -> Result<Vec<ReactionCount>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let rows = client
            .query("SELECT * FROM reaction_counts WHERE snapshot_id = $1", &[&snapshot_id])
            .await
            .map_err(map_pg)?;
        Ok(rows
            .iter()
            .map(|r| ReactionCount {
                snapshot_id: r.get("snapshot_id"),
                emoji: r.get("emoji"),
                count: r.get("count"),
            })
            .collect())
    }

    async fn posts_pending_enrichment(&self, limit: u32) -> Result<Vec<Post>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let rows = client
            .query(
                r#"
                SELECT p.* FROM posts p
                JOIN post_content pc ON pc.post_id = p.id
                LEFT JOIN post_enrichments pe ON pe.post_id = p.id
                WHERE pe.post_id IS NULL AND length(trim(pc.text_content)) > 0
                ORDER BY p.published_at ASC
                LIMIT $1
                "#,
                &[&(limit as i64)],
            )
            .await
            .map_err(map_pg)?;
        Ok(rows.iter().map(row_to_post).collect())
    }

    async fn get_enrichment(&self, post_id: Uuid) -> Result<Option<PostEnrichment>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_opt("SELECT * FROM post_enrichments WHERE post_id = $1", &[&post_id])
            .await
            .map_err(map_pg)?;
        Ok(row.as_ref().map(row_to_enrichment))
    }

    async fn save_enrichment(&self, enrichment: &PostEnrichment) -> Result<(), DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let explicit: Vec<String> = enrichment.explicit_keywords.iter().cloned().collect();
        let implicit: Vec<String> = enrichment.implicit_keywords.iter().cloned().collect();
        let entities_json =
            serde_json::to_value(&enrichment.entities).unwrap_or_else(|_| serde_json::json!({}));
        let category = enrichment.category.as_str();
        let sentiment = enrichment.sentiment.as_str();
        client
            .execute(
                r#"
                INSERT INTO post_enrichments
                    (post_id, explicit_keywords, implicit_keywords, category, sentiment,
                     entities, model_used, token_count, processing_time_ms, enriched_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (post_id) DO UPDATE SET
                    explicit_keywords = EXCLUDED.explicit_keywords,
                    implicit_keywords = EXCLUDED.implicit_keywords,
                    category = EXCLUDED.category,
                    sentiment = EXCLUDED.sentiment,
                    entities = EXCLUDED.entities,
                    model_used = EXCLUDED.model_used,
                    token_count = EXCLUDED.token_count,
                    processing_time_ms = EXCLUDED.processing_time_ms,
                    enriched_at = EXCLUDED.enriched_at
                "#,
                &[
                    &enrichment.post_id,
                    &explicit,
                    &implicit,
                    &category,
                    &sentiment,
                    &entities_json,
                    &enrichment.model_used,
                    &enrichment.token_count,
                    &enrichment.processing_time_ms,
                    &enrichment.enriched_at,
                ],
            )
            .await
            .map_err(map_pg)?;
        Ok(())
    }

    async fn append_usage_entry(&self, entry: &LlmUsageEntry) -> Result<(), DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        client
            .execute(
                r#"
                INSERT INTO llm_usage_entries
                    (id, model, prompt_tokens, completion_tokens, total_tokens,
                     estimated_cost_micro_usd, task_name, posts_processed)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
                &[
                    &entry.id,
                    &entry.model,
                    &entry.prompt_tokens,
                    &entry.completion_tokens,
                    &entry.total_tokens,
                    &entry.estimated_cost_usd.0,
                    &entry.task_name,
                    &entry.posts_processed,
                ],
            )
            .await
            .map_err(map_pg)?;
        Ok(())
    }

    async fn cost_since(&self, since: DateTime<Utc>) -> Result<MicroUsd, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let row = client
            .query_one(
                "SELECT COALESCE(SUM(estimated_cost_micro_usd), 0)::BIGINT AS total \
                 FROM llm_usage_entries WHERE created_at >= $1",
                &[&since],
            )
            .await
            .map_err(map_pg)?;
        Ok(MicroUsd(row.get("total")))
    }

    async fn search_candidates(&self, query: &SearchQuery) -> Result<Vec<RankedPost>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;

        let since = Utc::now() - chrono::Duration::hours(query.max_age_hours as i64);
        // The same keyword array is used two ways: fed through unnest() and
        // plainto_tsquery() one keyword at a time for the full-text arm (so a
        // multi-word keyword like "prime minister" is ANDed as a phrase, not
        // parsed as tsquery operator syntax), and used directly as the
        // array-overlap operand against explicit/implicit keywords.
        let keyword_array = query.keywords.clone();
        let category = query.category.map(|c| c.as_str());
        let sentiment = query.sentiment.map(|s| s.as_str());

        let rows = client
            .query(
                r#"
                SELECT
                    p.id, p.channel_id, p.telegram_message_id, p.published_at, p.is_forwarded,
                    p.forward_from_channel_id, p.forward_from_message_id, p.collected_at,
                    pc.text_content, pc.language,
                    pe.post_id AS enrichment_post_id, pe.explicit_keywords, pe.implicit_keywords,
                    pe.category, pe.sentiment, pe.entities, pe.model_used, pe.token_count,
                    pe.processing_time_ms, pe.enriched_at,
                    COALESCE(s.view_count, 0) AS view_count,
                    COALESCE(s.forward_count, 0) AS forward_count,
                    COALESCE(s.reply_count, 0) AS reply_count,
                    COALESCE(s.reaction_score, 0) AS reaction_score,
                    COALESCE(s.relative_engagement, 0) AS relative_engagement
                FROM posts p
                LEFT JOIN post_content pc ON pc.post_id = p.id
                LEFT JOIN post_enrichments pe ON pe.post_id = p.id
                LEFT JOIN LATERAL (
                    SELECT view_count, forward_count, reply_count, reaction_score, relative_engagement
                    FROM engagement_snapshots es
                    WHERE es.post_id = p.id
                    ORDER BY es.collected_at DESC
                    LIMIT 1
                ) s ON true
                WHERE p.published_at >= $1
                  AND (
                    cardinality($2::text[]) = 0
                    OR EXISTS (
                        SELECT 1 FROM unnest($2::text[]) AS kw
                        WHERE pc.tsv_english @@ plainto_tsquery('english', kw)
                           OR pc.tsv_russian @@ plainto_tsquery('russian', kw)
                           OR pc.tsv_simple @@ plainto_tsquery('simple', kw)
                    )
                    OR ($5 AND (
                        COALESCE(pe.explicit_keywords, '{}') && $2
                        OR COALESCE(pe.implicit_keywords, '{}') && $2
                    ))
                  )
                  AND ($3::text IS NULL OR pe.category = $3)
                  AND ($4::text IS NULL OR pe.sentiment = $4)
                ORDER BY p.published_at DESC
                "#,
                &[
                    &since,
                    &keyword_array,
                    &category,
                    &sentiment,
                    &query.include_enrichment,
                ],
            )
            .await
            .map_err(map_pg)?;

        Ok(rows.iter().map(row_to_ranked_post).collect())
    }

    async fn list_saved_topics(&self) -> Result<Vec<SavedTopic>, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let rows = client
            .query("SELECT * FROM saved_topics ORDER BY name", &[])
            .await
            .map_err(map_pg)?;
        Ok(rows.iter().map(row_to_saved_topic).collect())
    }

    async fn save_topic(
        &self,
        name: &str,
        keywords: &[String],
        sort_mode: SortMode,
    ) -> Result<SavedTopic, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        let keywords_json = Json(keywords.to_vec());
        let sort_mode_str = sort_mode.as_str();
        let row = client
            .query_one(
                r#"
                INSERT INTO saved_topics (id, name, keywords, sort_mode)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (name) DO UPDATE SET
                    keywords = EXCLUDED.keywords,
                    sort_mode = EXCLUDED.sort_mode,
                    updated_at = now()
                RETURNING *
                "#,
                &[&Uuid::new_v4(), &name, &keywords_json, &sort_mode_str],
            )
            .await
            .map_err(map_pg)?;
        Ok(row_to_saved_topic(&row))
    }

    async fn delete_saved_topic(&self, name: &str) -> Result<(), DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        client
            .execute("DELETE FROM saved_topics WHERE name = $1", &[&name])
            .await
            .map_err(map_pg)?;
        Ok(())
    }

    async fn sweep_retention(&self, older_than: DateTime<Utc>) -> Result<u64, DomainError> {
        let client = self.pool.get().await.map_err(map_pool)?;
        client
            .execute("DELETE FROM posts WHERE published_at < $1", &[&older_than])
            .await
            .map_err(map_pg)
    }
}
