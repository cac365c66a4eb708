//! # Core Traits (Ports)
//!
//! Collaborators the coordinator talks to. Any plugin must implement these
//! traits to be used by the binary.

use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Cursor, MediaKey, Post, ReactionKind, UserSettings};

/// Receives posts pushed by a live subscription after its initial batch.
pub trait LiveSink: Send + Sync {
    fn deliver(&self, posts: Vec<Post>);
}

/// Handle to a live feed subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// A subscription with nothing to tear down.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}

/// Remote feed data: fetching, live updates and mutations.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Returns the newest `limit` posts and starts delivering newer ones to `sink`.
    async fn subscribe(
        &self,
        user_id: Uuid,
        limit: usize,
        sink: Box<dyn LiveSink>,
    ) -> anyhow::Result<(Vec<Post>, Subscription)>;

    /// Returns up to `limit` posts older than `cursor`, newest first.
    async fn fetch_older(&self, user_id: Uuid, cursor: Cursor, limit: usize) -> anyhow::Result<Vec<Post>>;

    /// Sets (or clears, with `None`) the user's reaction on a post.
    async fn mutate_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        reaction: Option<ReactionKind>,
    ) -> anyhow::Result<()>;

    async fn delete_post(&self, post_id: Uuid, user_id: Uuid) -> anyhow::Result<()>;

    async fn fetch_user_settings(&self, user_id: Uuid) -> anyhow::Result<UserSettings>;
}

/// Snapshot reported by a player handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    pub is_playing: bool,
}

/// A handle to one video surface.
///
/// Readiness and load errors are reported back to the coordinator as events.
/// Every call must be a no-op once the handle has been disposed.
pub trait MediaPlayer: Send {
    fn load(&mut self, url: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn set_muted(&mut self, muted: bool);
    fn status(&self) -> PlayerStatus;
    fn dispose(&mut self);
}

/// Creates player handles for video media as posts mount.
pub trait PlayerFactory: Send {
    fn create(&mut self, key: MediaKey) -> Box<dyn MediaPlayer>;
}
