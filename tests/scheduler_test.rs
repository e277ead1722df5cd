//! Manual-sync cooldown and per-caller isolation. `Scheduler` cooldowns are
//! measured with `std::time::Instant`, which `tokio::time::pause` cannot
//! fast-forward, so this test uses a millisecond-scale cooldown window
//! instead of a real multi-minute one, preserving the same ratios (rejected
//! partway through the window with most of it remaining, accepted again
//! once it fully elapses).

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{channel_fixture, message_fixture, FakeStore, FakeTelegramAdapter};
use tnse::domain::{DomainError, ManualTarget, ReactionWeights};
use tnse::usecases::{Collector, Scheduler};

fn weights() -> ReactionWeights {
    ReactionWeights(std::collections::BTreeMap::new())
}

#[tokio::test]
async fn manual_sync_cooldown_rejects_then_accepts_again() {
    let store = Arc::new(FakeStore::new());
    let channel = channel_fixture(1, 100);
    let channel_id = channel.id;
    store.seed_channel(channel);

    let telegram = Arc::new(FakeTelegramAdapter::new(vec![message_fixture(1, 1, &[])]));
    let collector = Arc::new(Collector::new(telegram, Arc::clone(&store), weights(), Duration::from_secs(86_400), 100));
    let scheduler = Scheduler::new(collector, Arc::clone(&store), 4, Duration::from_millis(300));

    // t=0: accepted.
    scheduler
        .trigger_manual("caller-1".to_string(), ManualTarget::Channel(channel_id))
        .await
        .expect("first manual sync is accepted");

    // t=60ms: rejected, ~240ms of the 300ms window remaining.
    tokio::time::sleep(Duration::from_millis(60)).await;
    match scheduler
        .trigger_manual("caller-1".to_string(), ManualTarget::Channel(channel_id))
        .await
    {
        Err(DomainError::RateLimited { remaining }) => {
            assert!(
                remaining >= Duration::from_millis(200) && remaining <= Duration::from_millis(245),
                "expected ~240ms remaining, got {remaining:?}"
            );
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }

    // t=301ms: the window has fully elapsed, accepted again.
    tokio::time::sleep(Duration::from_millis(241)).await;
    scheduler
        .trigger_manual("caller-1".to_string(), ManualTarget::Channel(channel_id))
        .await
        .expect("cooldown has elapsed, sync is accepted");
}

#[tokio::test]
async fn cooldown_is_scoped_per_caller() {
    let store = Arc::new(FakeStore::new());
    let channel = channel_fixture(1, 100);
    let channel_id = channel.id;
    store.seed_channel(channel);

    let telegram = Arc::new(FakeTelegramAdapter::new(vec![message_fixture(1, 1, &[])]));
    let collector = Arc::new(Collector::new(telegram, Arc::clone(&store), weights(), Duration::from_secs(86_400), 100));
    let scheduler = Scheduler::new(collector, Arc::clone(&store), 4, Duration::from_millis(300));

    scheduler
        .trigger_manual("caller-a".to_string(), ManualTarget::Channel(channel_id))
        .await
        .expect("caller-a's first sync is accepted");

    // caller-b is unaffected by caller-a's cooldown.
    scheduler
        .trigger_manual("caller-b".to_string(), ManualTarget::Channel(channel_id))
        .await
        .expect("a different caller is not subject to caller-a's cooldown");
}
