//! Implements `TelegramAdapter` using grammers Client.
//!
//! Lazily connects on first call. Flood-wait (RPC code 420) sleeps for the
//! server-indicated interval, bounded by a configured cap, and retries; other
//! transient failures use exponential backoff with jitter. Both a
//! per-second and a per-minute token bucket must admit a call before it
//! proceeds.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use grammers_client::tl;
use grammers_client::{Client, InvocationError};
use rand::Rng;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::adapters::telegram::mapper;
use crate::adapters::telegram::ratelimit::DualBucket;
use crate::domain::{ChannelInfo, DomainError, FetchBatch, ResolveOutcome};
use crate::ports::TelegramAdapter;

const MAX_FLOOD_RETRIES: u32 = 5;
const MAX_TRANSIENT_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;

struct Credentials {
    api_id: i32,
    api_hash: String,
    session_path: PathBuf,
}

/// Telegram gateway adapter. Connects lazily; the underlying `Client` is
/// shared internally once established.
pub struct GrammersTelegramAdapter {
    credentials: Credentials,
    client: OnceCell<Client>,
    flood_wait_cap: Duration,
    buckets: DualBucket,
    peer_cache: Mutex<HashMap<i64, tl::enums::InputPeer>>,
}

impl GrammersTelegramAdapter {
    pub fn new(
        api_id: i32,
        api_hash: String,
        session_path: PathBuf,
        flood_wait_cap: Duration,
        rps: u32,
        rpm: u32,
    ) -> Self {
        Self {
            credentials: Credentials {
                api_id,
                api_hash,
                session_path,
            },
            client: OnceCell::new(),
            flood_wait_cap,
            buckets: DualBucket::new(rps, rpm),
            peer_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Establishes the MTProto connection on first use. Callers never call
    /// this explicitly.
    async fn client(&self) -> Result<&Client, DomainError> {
        self.client
            .get_or_try_init(|| async {
                let session = crate::adapters::telegram::session_storage(
                    &self.credentials.session_path,
                )
                .await?;
                let pool = grammers_client::SenderPool::new(Arc::new(session), self.credentials.api_id);
                let handle = pool.handle.clone();
                tokio::spawn(async move {
                    pool.runner.run().await;
                });
                Ok(Client::new(handle))
            })
            .await
    }

    async fn resolve_input_peer(&self, telegram_id: i64) -> Result<tl::enums::InputPeer, DomainError> {
        if let Some(peer) = self.peer_cache.lock().await.get(&telegram_id).cloned() {
            return Ok(peer);
        }
        let client = self.client().await?;
        let mut dialogs = client.iter_dialogs();
        while let Some(dialog) = dialogs
            .next()
            .await
            .map_err(|e| DomainError::TgGateway(e.to_string()))?
        {
            let peer = dialog.peer();
            if peer.id().bot_api_dialog_id() == telegram_id {
                let peer_ref = peer
                    .to_ref()
                    .await
                    .ok_or_else(|| DomainError::TgGateway("peer not in session cache".into()))?;
                let input_peer: tl::enums::InputPeer = peer_ref.into();
                self.peer_cache
                    .lock()
                    .await
                    .insert(telegram_id, input_peer.clone());
                return Ok(input_peer);
            }
        }
        Err(DomainError::TgGateway(format!(
            "channel {telegram_id} not found in dialogs"
        )))
    }

    /// Sleeps with exponential backoff plus jitter for attempt `n` (0-indexed).
    async fn backoff_sleep(attempt: u32) {
        let base = BASE_BACKOFF_MS * 2u64.saturating_pow(attempt);
        let jitter = rand::thread_rng().gen_range(0..base / 2 + 1);
        tokio::time::sleep(Duration::from_millis(base + jitter)).await;
    }
}

#[async_trait::async_trait]
impl TelegramAdapter for GrammersTelegramAdapter {
    async fn resolve(&self, identifier: &str) -> Result<ResolveOutcome, DomainError> {
        let username = normalize_identifier(identifier);
        let client = self.client().await?;

        self.buckets.acquire().await;
        let req = tl::functions::contacts::ResolveUsername {
            username: username.clone(),
        };

        match client.invoke(&req).await {
            Ok(tl::enums::contacts::ResolvedPeer::Peer(resolved)) => {
                let chat = resolved
                    .chats
                    .into_iter()
                    .find_map(|c| match c {
                        tl::enums::Chat::Channel(ch) => Some(ch),
                        _ => None,
                    });
                match chat {
                    Some(ch) => Ok(ResolveOutcome::Found(ChannelInfo {
                        telegram_id: ch.id as i64,
                        username: ch.username.unwrap_or(username),
                        title: ch.title,
                        description: None,
                        subscriber_count: ch.participants_count.unwrap_or(0) as i64,
                    })),
                    None => Ok(ResolveOutcome::NotFound),
                }
            }
            Err(InvocationError::Rpc(rpc)) if rpc.name == "USERNAME_NOT_OCCUPIED" => {
                Ok(ResolveOutcome::NotFound)
            }
            Err(InvocationError::Rpc(rpc)) if rpc.name == "CHANNEL_PRIVATE" => {
                Ok(ResolveOutcome::Private)
            }
            Err(e) => Err(DomainError::TgGateway(e.to_string())),
        }
    }

    async fn fetch_messages(
        &self,
        telegram_channel_id: i64,
        min_id: i64,
        max_age: Duration,
        limit: i32,
    ) -> Result<FetchBatch, DomainError> {
        let min_id = min_id.max(0);
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default();
        let input_peer = self.resolve_input_peer(telegram_channel_id).await?;

        let mut flood_attempts = 0u32;
        let mut transient_attempts = 0u32;
        loop {
            self.buckets.acquire().await;
            let client = self.client().await?;
            let req = tl::functions::messages::GetHistory {
                peer: input_peer.clone(),
                offset_id: 0,
                offset_date: 0,
                add_offset: 0,
                limit,
                max_id: 0,
                min_id: min_id as i32,
                hash: 0,
            };

            match client.invoke(&req).await {
                Ok(raw) => {
                    let raw_messages = match raw {
                        tl::enums::messages::Messages::Messages(m) => m.messages,
                        tl::enums::messages::Messages::Slice(m) => m.messages,
                        tl::enums::messages::Messages::ChannelMessages(m) => m.messages,
                        tl::enums::messages::Messages::NotModified(_) => Vec::new(),
                    };

                    let mut messages = Vec::new();
                    let mut max_message_id = None;
                    for raw_msg in &raw_messages {
                        let Some(fetched) = mapper::message_to_fetched(raw_msg) else {
                            continue;
                        };
                        if fetched.telegram_message_id <= min_id || fetched.published_at < cutoff {
                            continue;
                        }
                        max_message_id = Some(
                            max_message_id
                                .map(|m: i64| m.max(fetched.telegram_message_id))
                                .unwrap_or(fetched.telegram_message_id),
                        );
                        messages.push(fetched);
                    }

                    return Ok(FetchBatch {
                        messages,
                        max_message_id,
                    });
                }
                Err(InvocationError::Rpc(rpc)) if rpc.code == 420 => {
                    flood_attempts += 1;
                    if flood_attempts > MAX_FLOOD_RETRIES {
                        return Err(DomainError::TgGateway(
                            "flood wait retries exhausted".into(),
                        ));
                    }
                    let wait = Duration::from_secs(rpc.value.unwrap_or(60) as u64).min(self.flood_wait_cap);
                    warn!(attempt = flood_attempts, wait_secs = wait.as_secs(), "flood wait, sleeping");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    transient_attempts += 1;
                    if transient_attempts > MAX_TRANSIENT_RETRIES {
                        return Err(DomainError::TgGateway(e.to_string()));
                    }
                    debug!(attempt = transient_attempts, error = %e, "transient fetch failure, backing off");
                    Self::backoff_sleep(transient_attempts - 1).await;
                }
            }
        }
    }
}

/// Strips scheme, leading `@`, and whitespace; the lookup key is always
/// lowercase.
fn normalize_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    let without_scheme = trimmed
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("t.me/")
        .trim_start_matches('@');
    without_scheme.to_lowercase()
}
