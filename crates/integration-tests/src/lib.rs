//! Shared fixtures for the integration test targets.

use chrono::{Duration, TimeZone, Utc};
use rf_core::{Media, Post, ReactionSummary};
use rf_engine::{EngineConfig, FeedCommand, FeedCoordinator, FeedEvent, RequestId};
use rf_player_headless::{HeadlessPlayerFactory, Journal};
use uuid::Uuid;

pub const VIEWER: Uuid = Uuid::from_u128(0xfeed);

pub fn id(n: u32) -> Uuid {
    Uuid::from_u128(n as u128)
}

/// Post `n`; higher numbers are older.
pub fn post(n: u32, media: Vec<Media>) -> Post {
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    Post {
        id: id(n),
        author_id: VIEWER,
        text: format!("post {n}"),
        media,
        reactions: ReactionSummary::default(),
        comment_count: 0,
        created_at: base - Duration::minutes(n as i64),
        location: None,
        pending_deletion: false,
    }
}

pub fn text_posts(range: std::ops::RangeInclusive<u32>) -> Vec<Post> {
    range.map(|n| post(n, vec![])).collect()
}

pub fn video(i: usize) -> Media {
    Media::video(format!("https://cdn.example/{i}.mp4"), None, i)
}

pub fn image(i: usize) -> Media {
    Media::image(format!("https://cdn.example/{i}.jpg"), i)
}

pub fn subscribe_request(commands: &[FeedCommand]) -> Option<RequestId> {
    commands.iter().find_map(|c| match c {
        FeedCommand::Subscribe { request, .. } => Some(*request),
        _ => None,
    })
}

/// A coordinator whose initial batch has already arrived.
pub fn loaded_feed(config: EngineConfig, posts: Vec<Post>) -> (FeedCoordinator, Journal) {
    let players = HeadlessPlayerFactory::new();
    let journal = players.journal();
    let mut feed = FeedCoordinator::new(config, VIEWER, Box::new(players));
    feed.dispatch(FeedEvent::LoadInitial);
    let request = subscribe_request(&feed.take_commands()).expect("load_initial subscribes");
    feed.dispatch(FeedEvent::InitialLoaded { request, result: Ok(posts) });
    (feed, journal)
}

/// Mounts the post and reports it entering the viewport.
pub fn show(feed: &mut FeedCoordinator, post_id: Uuid) {
    feed.push(FeedEvent::PostMounted(post_id));
    feed.push(FeedEvent::ViewportEnter(post_id));
    feed.process();
}
