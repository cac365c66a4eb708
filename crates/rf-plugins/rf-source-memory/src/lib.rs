//! # rf-source-memory
//! rusty-feed/crates/rf-plugins/rf-source-memory/src/lib.rs
//! In-process implementation of `FeedSource`.
//! Holds posts, per-user reactions and settings in memory and fans published
//! posts out to live subscribers. Used by the simulator binary and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use dashmap::DashMap;
use rf_core::{Cursor, FeedSource, LiveSink, Post, ReactionKind, ReactionSummary, Subscription, UserSettings};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

struct Listener {
    user_id: Uuid,
    sink: Box<dyn LiveSink>,
}

#[derive(Default)]
pub struct MemoryFeedSource {
    posts: RwLock<HashMap<Uuid, Post>>,
    /// post id -> (user id -> reaction)
    reactions: DashMap<Uuid, HashMap<Uuid, ReactionKind>>,
    settings: DashMap<Uuid, UserSettings>,
    listeners: Arc<DashMap<u64, Listener>>,
    next_listener: AtomicU64,
    offline: AtomicBool,
}

impl MemoryFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a post without notifying subscribers.
    pub async fn insert(&self, post: Post) {
        self.posts.write().await.insert(post.id, post);
    }

    /// Stores a post and delivers it to every live subscriber.
    pub async fn publish(&self, post: Post) {
        self.insert(post.clone()).await;
        for listener in self.listeners.iter() {
            let copy = self.viewed_by(post.clone(), listener.user_id);
            listener.sink.deliver(vec![copy]);
        }
        debug!(post_id = %post.id, listeners = self.listeners.len(), "post published");
    }

    /// While offline every call fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn put_settings(&self, user_id: Uuid, settings: UserSettings) {
        self.settings.insert(user_id, settings);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn reaction_of(&self, post_id: Uuid, user_id: Uuid) -> Option<ReactionKind> {
        self.reactions.get(&post_id).and_then(|r| r.get(&user_id).copied())
    }

    pub async fn contains(&self, post_id: Uuid) -> bool {
        self.posts.read().await.contains_key(&post_id)
    }

    fn ensure_online(&self) -> anyhow::Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("feed source is offline");
        }
        Ok(())
    }

    /// Fills in the reaction summary as `user_id` sees it.
    fn viewed_by(&self, mut post: Post, user_id: Uuid) -> Post {
        post.reactions = match self.reactions.get(&post.id) {
            Some(by_user) => ReactionSummary {
                count: u32::try_from(by_user.len()).unwrap_or(u32::MAX),
                mine: by_user.get(&user_id).copied(),
            },
            None => ReactionSummary::default(),
        };
        post
    }

    /// Posts matching `keep`, newest first, limited to `limit`.
    async fn newest(&self, user_id: Uuid, limit: usize, keep: impl Fn(&Post) -> bool) -> Vec<Post> {
        let posts = self.posts.read().await;
        let mut matching: Vec<&Post> = posts.values().filter(|p| keep(*p)).collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        matching.into_iter().take(limit).map(|p| self.viewed_by(p.clone(), user_id)).collect()
    }
}

#[async_trait]
impl FeedSource for MemoryFeedSource {
    async fn subscribe(
        &self,
        user_id: Uuid,
        limit: usize,
        sink: Box<dyn LiveSink>,
    ) -> anyhow::Result<(Vec<Post>, Subscription)> {
        self.ensure_online()?;
        let posts = self.newest(user_id, limit, |_| true).await;

        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.insert(id, Listener { user_id, sink });
        info!(user_id = %user_id, listener = id, initial = posts.len(), "subscribed");

        let listeners = Arc::clone(&self.listeners);
        let subscription = Subscription::new(move || {
            listeners.remove(&id);
            debug!(listener = id, "unsubscribed");
        });
        Ok((posts, subscription))
    }

    async fn fetch_older(&self, user_id: Uuid, cursor: Cursor, limit: usize) -> anyhow::Result<Vec<Post>> {
        self.ensure_online()?;
        Ok(self.newest(user_id, limit, |p| cursor.precedes(p)).await)
    }

    async fn mutate_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        reaction: Option<ReactionKind>,
    ) -> anyhow::Result<()> {
        self.ensure_online()?;
        if !self.contains(post_id).await {
            bail!("post {post_id} not found");
        }
        let mut by_user = self.reactions.entry(post_id).or_default();
        match reaction {
            Some(kind) => by_user.insert(user_id, kind),
            None => by_user.remove(&user_id),
        };
        debug!(post_id = %post_id, user_id = %user_id, ?reaction, "reaction stored");
        Ok(())
    }

    async fn delete_post(&self, post_id: Uuid, user_id: Uuid) -> anyhow::Result<()> {
        self.ensure_online()?;
        let mut posts = self.posts.write().await;
        let author = posts.get(&post_id).map(|p| p.author_id).with_context(|| format!("post {post_id} not found"))?;
        if author != user_id {
            bail!("user {user_id} may not delete post {post_id}");
        }
        posts.remove(&post_id);
        self.reactions.remove(&post_id);
        info!(post_id = %post_id, "post deleted");
        Ok(())
    }

    async fn fetch_user_settings(&self, user_id: Uuid) -> anyhow::Result<UserSettings> {
        self.ensure_online()?;
        Ok(self.settings.get(&user_id).map(|s| *s).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Mutex;

    const ALICE: Uuid = Uuid::from_u128(1);
    const BOB: Uuid = Uuid::from_u128(2);

    fn post(n: u32, author: Uuid) -> Post {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Post {
            id: Uuid::from_u128(100 + n as u128),
            author_id: author,
            text: format!("post {n}"),
            media: vec![],
            reactions: ReactionSummary::default(),
            comment_count: 0,
            created_at: base - Duration::minutes(n as i64),
            location: None,
            pending_deletion: false,
        }
    }

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<Uuid>>>);

    impl LiveSink for Collect {
        fn deliver(&self, posts: Vec<Post>) {
            self.0.lock().unwrap().extend(posts.iter().map(|p| p.id));
        }
    }

    async fn seeded() -> MemoryFeedSource {
        let source = MemoryFeedSource::new();
        for n in 1..=5 {
            source.insert(post(n, ALICE)).await;
        }
        source
    }

    #[tokio::test]
    async fn test_subscribe_returns_newest_first() {
        let source = seeded().await;
        let (posts, _sub) = source.subscribe(ALICE, 3, Box::new(Collect::default())).await.unwrap();
        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![post(1, ALICE).id, post(2, ALICE).id, post(3, ALICE).id]);
    }

    #[tokio::test]
    async fn test_fetch_older_continues_after_cursor() {
        let source = seeded().await;
        let older = source.fetch_older(ALICE, post(3, ALICE).cursor(), 10).await.unwrap();
        let ids: Vec<Uuid> = older.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![post(4, ALICE).id, post(5, ALICE).id]);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers_until_dropped() {
        let source = seeded().await;
        let sink = Collect::default();
        let (_, sub) = source.subscribe(ALICE, 5, Box::new(sink.clone())).await.unwrap();
        source.publish(post(0, BOB)).await;
        assert_eq!(sink.0.lock().unwrap().as_slice(), &[post(0, BOB).id]);

        drop(sub);
        assert_eq!(source.listener_count(), 0);
        source.publish(post(6, BOB)).await;
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reactions_are_counted_per_viewer() {
        let source = seeded().await;
        let id = post(1, ALICE).id;
        source.mutate_reaction(id, ALICE, Some(ReactionKind::Love)).await.unwrap();
        source.mutate_reaction(id, BOB, Some(ReactionKind::Like)).await.unwrap();

        let (posts, _sub) = source.subscribe(BOB, 1, Box::new(Collect::default())).await.unwrap();
        assert_eq!(posts[0].reactions, ReactionSummary { count: 2, mine: Some(ReactionKind::Like) });

        source.mutate_reaction(id, BOB, None).await.unwrap();
        assert_eq!(source.reaction_of(id, BOB), None);
        assert_eq!(source.reaction_of(id, ALICE), Some(ReactionKind::Love));
    }

    #[tokio::test]
    async fn test_only_author_may_delete() {
        let source = seeded().await;
        let id = post(2, ALICE).id;
        assert!(source.delete_post(id, BOB).await.is_err());
        assert!(source.contains(id).await);
        source.delete_post(id, ALICE).await.unwrap();
        assert!(!source.contains(id).await);
        assert!(source.delete_post(id, ALICE).await.is_err());
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let source = seeded().await;
        source.set_offline(true);
        assert!(source.fetch_user_settings(ALICE).await.is_err());
        assert!(source.fetch_older(ALICE, post(1, ALICE).cursor(), 5).await.is_err());
        source.set_offline(false);
        assert_eq!(source.fetch_user_settings(ALICE).await.unwrap(), UserSettings::default());
    }
}
