//! The async driver against the in-memory source.

use std::sync::Arc;

use integration_tests::{id, post, text_posts, video, VIEWER};
use rf_core::{FeedError, MediaKey, Mutation, ReactionKind, UserSettings};
use rf_engine::{EngineConfig, FeedCoordinator, FeedDriver, FeedEvent, PlaybackState};
use rf_player_headless::HeadlessPlayerFactory;
use rf_source_memory::MemoryFeedSource;
use uuid::Uuid;

async fn seeded(posts: Vec<rf_core::Post>) -> (FeedDriver, Arc<MemoryFeedSource>) {
    let source = Arc::new(MemoryFeedSource::new());
    for post in posts {
        source.insert(post).await;
    }
    let coordinator = FeedCoordinator::new(EngineConfig::default(), VIEWER, Box::new(HeadlessPlayerFactory::new()));
    let driver = FeedDriver::new(coordinator, source.clone());
    (driver, source)
}

#[tokio::test]
async fn test_pages_through_until_exhausted() {
    let (mut driver, _source) = seeded(text_posts(1..=45)).await;
    driver.handle(FeedEvent::LoadInitial);
    driver.settle().await;
    assert_eq!(driver.coordinator().post_ids().len(), 20);

    for expected in [40, 45, 45] {
        driver.handle(FeedEvent::EndReached { distance: 0.0 });
        driver.settle().await;
        assert_eq!(driver.coordinator().post_ids().len(), expected);
    }
    assert!(driver.coordinator().paginator().is_exhausted());
    assert_eq!(driver.coordinator().post_ids().last(), Some(&id(45)));
}

#[tokio::test]
async fn test_short_first_page_never_loads_more() {
    let (mut driver, _source) = seeded(text_posts(1..=5)).await;
    driver.handle(FeedEvent::LoadInitial);
    driver.settle().await;
    driver.handle(FeedEvent::EndReached { distance: 0.0 });
    assert_eq!(driver.outstanding(), 0);
}

#[tokio::test]
async fn test_published_post_is_prepended() {
    let (mut driver, source) = seeded(text_posts(1..=3)).await;
    driver.handle(FeedEvent::LoadInitial);
    driver.settle().await;
    assert_eq!(source.listener_count(), 1);

    source.publish(post(0, vec![video(0)])).await;
    driver.settle().await;
    assert_eq!(driver.coordinator().post_ids(), &[id(0), id(1), id(2), id(3)]);

    driver.unsubscribe();
    assert_eq!(source.listener_count(), 0);
}

#[tokio::test]
async fn test_reaction_round_trip_reaches_source() {
    let (mut driver, source) = seeded(text_posts(1..=2)).await;
    driver.handle(FeedEvent::LoadInitial);
    driver.settle().await;

    driver.handle(FeedEvent::LongPress(id(2)));
    driver.handle(FeedEvent::TraySelect { post_id: id(2), kind: ReactionKind::Angry });
    driver.settle().await;

    assert_eq!(source.reaction_of(id(2), VIEWER), Some(ReactionKind::Angry));
    assert!(driver.coordinator_mut().take_failures().is_empty());

    driver.handle(FeedEvent::Refresh);
    driver.settle().await;
    let view = driver.coordinator().view(id(2)).unwrap();
    assert_eq!(view.reaction, Some(ReactionKind::Angry));
    assert_eq!(view.reaction_count, 1);
}

#[tokio::test]
async fn test_foreign_post_delete_is_rolled_back() {
    let mut foreign = post(2, vec![]);
    foreign.author_id = Uuid::from_u128(77);
    let (mut driver, source) = seeded(vec![post(1, vec![]), foreign]).await;
    driver.handle(FeedEvent::LoadInitial);
    driver.settle().await;

    driver.handle(FeedEvent::DeletePost(id(2)));
    assert!(driver.coordinator().view(id(2)).unwrap().pending_deletion);
    driver.settle().await;

    assert!(!driver.coordinator().view(id(2)).unwrap().pending_deletion);
    assert!(source.contains(id(2)).await);
    let failures = driver.coordinator_mut().take_failures();
    assert!(matches!(
        failures.as_slice(),
        [FeedError::MutationFailure { mutation: Mutation::Delete, .. }]
    ));

    driver.handle(FeedEvent::DeletePost(id(1)));
    driver.settle().await;
    assert_eq!(driver.coordinator().post_ids(), &[id(2)]);
    assert!(!source.contains(id(1)).await);
}

#[tokio::test]
async fn test_offline_refresh_keeps_current_feed() {
    let (mut driver, source) = seeded(text_posts(1..=3)).await;
    driver.handle(FeedEvent::LoadInitial);
    driver.settle().await;

    source.set_offline(true);
    driver.handle(FeedEvent::Refresh);
    driver.settle().await;

    assert_eq!(driver.coordinator().post_ids().len(), 3);
    let failures = driver.coordinator_mut().take_failures();
    assert!(matches!(failures.as_slice(), [FeedError::Source(reason)] if reason.contains("offline")));
}

#[tokio::test]
async fn test_stored_settings_gate_autoplay() {
    let (mut driver, source) = seeded(vec![post(1, vec![video(0)])]).await;
    source.put_settings(VIEWER, UserSettings { autoplay_video_enabled: false, mute_video_enabled: true });
    driver.handle(FeedEvent::LoadInitial);
    driver.settle().await;

    let key = MediaKey::new(id(1), 0);
    driver.handle(FeedEvent::PostMounted(id(1)));
    driver.handle(FeedEvent::ViewportEnter(id(1)));
    driver.handle(FeedEvent::MediaReady(key));
    assert_eq!(driver.coordinator().playback_state(key), Some(PlaybackState::Paused));
    assert_eq!(driver.coordinator().now_playing(), None);
}
