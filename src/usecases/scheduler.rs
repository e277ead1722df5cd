//! Periodic + manual collection fan-out. Sweeps every active channel on a
//! semaphore-bounded schedule, and exposes a manual per-caller trigger
//! gated by a cooldown window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{DomainError, ManualTarget, SchedulerReport};
use crate::ports::outbound::{Store, TelegramAdapter};
use crate::usecases::collector::Collector;

const MAX_COLLECT_RETRIES: u32 = 2;
const BASE_BACKOFF_MS: u64 = 500;

pub type CallerId = String;

pub struct Scheduler<T: TelegramAdapter, S: Store> {
    collector: Arc<Collector<T, S>>,
    store: Arc<S>,
    max_concurrent: usize,
    manual_sync_cooldown: Duration,
    cooldowns: Mutex<HashMap<CallerId, Instant>>,
}

impl<T: TelegramAdapter + 'static, S: Store + 'static> Scheduler<T, S> {
    pub fn new(
        collector: Arc<Collector<T, S>>,
        store: Arc<S>,
        max_concurrent: usize,
        manual_sync_cooldown: Duration,
    ) -> Self {
        Self {
            collector,
            store,
            max_concurrent,
            manual_sync_cooldown,
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one sweep over every active channel, bounded by a semaphore so
    /// a large channel list never opens more than `max_concurrent`
    /// connections at once. One channel's failure is captured in the report
    /// and never cancels another (`tokio::spawn` per channel).
    pub async fn run_periodic(&self) -> SchedulerReport {
        let channels = match self.store.list_active_channels().await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to list active channels, skipping this cycle");
                return SchedulerReport::default();
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(channels.len());

        for channel in channels {
            let sem = Arc::clone(&semaphore);
            let collector = Arc::clone(&self.collector);
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.expect("semaphore closed");
                collect_with_retry(&collector, channel.id).await
            }));
        }

        let mut report = SchedulerReport::default();
        for handle in handles {
            match handle.await {
                Ok(Ok(collection)) => {
                    report.channels_processed += 1;
                    report.posts_collected += collection.posts_collected;
                    for err in collection.errors {
                        report.errors.push(format!("{}: {}", err.telegram_message_id, err.message));
                    }
                }
                Ok(Err(e)) => {
                    report.channels_processed += 1;
                    report.errors.push(e.to_string());
                }
                Err(join_err) => {
                    report.errors.push(format!("collection task panicked: {join_err}"));
                }
            }
        }

        info!(
            channels = report.channels_processed,
            posts = report.posts_collected,
            errors = report.errors.len(),
            "periodic collection cycle complete"
        );
        report
    }

    /// Manual trigger for one caller. Rejects with `RateLimited` if the
    /// caller synced within the cooldown window. Best-effort: the cooldown
    /// map is process-local, so a multi-process deployment only widens the
    /// window, never tightens it.
    pub async fn trigger_manual(
        &self,
        caller_id: CallerId,
        target: ManualTarget,
    ) -> Result<SchedulerReport, DomainError> {
        {
            let mut cooldowns = self.cooldowns.lock().expect("cooldown lock poisoned");
            if let Some(last) = cooldowns.get(&caller_id) {
                let elapsed = last.elapsed();
                if elapsed < self.manual_sync_cooldown {
                    return Err(DomainError::RateLimited {
                        remaining: self.manual_sync_cooldown - elapsed,
                    });
                }
            }
            cooldowns.insert(caller_id, Instant::now());
        }

        let mut report = SchedulerReport::default();
        let channel_ids: Vec<Uuid> = match target {
            ManualTarget::AllChannels => self
                .store
                .list_active_channels()
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect(),
            ManualTarget::Channel(id) => vec![id],
        };

        for channel_id in channel_ids {
            match collect_with_retry(&self.collector, channel_id).await {
                Ok(collection) => {
                    report.channels_processed += 1;
                    report.posts_collected += collection.posts_collected;
                }
                Err(e) => {
                    report.channels_processed += 1;
                    report.errors.push(e.to_string());
                }
            }
        }

        Ok(report)
    }
}

/// Retries a transient collection failure with exponential backoff.
/// Non-transient errors (including auth failures) are surfaced immediately,
/// not retried.
async fn collect_with_retry<T: TelegramAdapter, S: Store>(
    collector: &Collector<T, S>,
    channel_id: Uuid,
) -> Result<crate::domain::CollectionReport, DomainError> {
    let mut attempt = 0;
    loop {
        match collector.collect_channel(channel_id).await {
            Ok(report) => return Ok(report),
            Err(e) if e.is_transient() && attempt < MAX_COLLECT_RETRIES => {
                attempt += 1;
                let delay = BASE_BACKOFF_MS * (1u64 << attempt);
                warn!(channel_id = %channel_id, attempt, error = %e, "collection failed, retrying");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_target_variants_are_distinct() {
        assert!(matches!(ManualTarget::AllChannels, ManualTarget::AllChannels));
        let id = Uuid::new_v4();
        assert!(matches!(ManualTarget::Channel(x) if x == id, ManualTarget::Channel(id)));
    }
}
